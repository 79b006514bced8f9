//! Reference parsing
//!
//! Only local component references are understood:
//! `#/components/<bucket>/<name>` optionally followed by a deeper pointer.
//! Names are JSON-pointer escaped (`~0` = `~`, `~1` = `/`).

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;
use std::sync::LazyLock;

use super::{ComponentKey, ComponentKind};
use crate::error::{Result, TypeModelError};

static COMPONENT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#/components/([^/]+)/([^/]+)((?:/[^/]*)*)$").expect("component ref regex")
});

/// A parsed `$ref`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub key: ComponentKey,
    /// Unescaped segments after the component name
    pub pointer: Vec<String>,
}

impl ComponentRef {
    /// True when the reference points inside a component rather than at it
    pub fn is_nested(&self) -> bool {
        !self.pointer.is_empty()
    }
}

/// Parse a reference string into the component it addresses
pub fn parse_reference(raw: &str) -> Result<ComponentRef> {
    if !raw.starts_with("#/") {
        return Err(TypeModelError::malformed(
            raw,
            "only local references (#/...) are supported",
        ));
    }

    let caps = COMPONENT_REF.captures(raw).ok_or_else(|| {
        TypeModelError::malformed(raw, "expected #/components/<bucket>/<name>")
    })?;

    let bucket = &caps[1];
    let kind = ComponentKind::from_segment(bucket).ok_or_else(|| {
        TypeModelError::malformed(raw, format!("unknown component bucket '{}'", bucket))
    })?;

    let name = unescape_segment(&caps[2]).ok_or_else(|| {
        TypeModelError::malformed(raw, "invalid '~' escape in component name")
    })?;

    let pointer = caps
        .get(3)
        .map(|m| m.as_str())
        .unwrap_or("")
        .split('/')
        .skip(1)
        .map(|s| {
            unescape_segment(s)
                .ok_or_else(|| TypeModelError::malformed(raw, "invalid '~' escape in pointer"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ComponentRef {
        key: ComponentKey::new(kind, name),
        pointer,
    })
}

/// JSON-pointer unescape of one segment; `None` on a dangling or unknown `~`
pub fn unescape_segment(segment: &str) -> Option<String> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Closest candidate for a misspelled component name.
///
/// Scores the query against each candidate in both directions so that both
/// truncated and over-long names find their match. Ties keep the earlier
/// candidate.
pub fn suggest_name<'a>(query: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    let mut best: Option<(i64, &str)> = None;
    for candidate in candidates {
        let score = matcher
            .fuzzy_match(candidate, query)
            .max(matcher.fuzzy_match(query, candidate));
        if let Some(score) = score {
            if best.map_or(true, |(b, _)| score > b) {
                best = Some((score, candidate));
            }
        }
    }
    best.map(|(_, name)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_reference() {
        let r = parse_reference("#/components/schemas/Pet").unwrap();
        assert_eq!(r.key, ComponentKey::schema("Pet"));
        assert!(!r.is_nested());
    }

    #[test]
    fn test_parse_escaped_name() {
        let r = parse_reference("#/components/responses/a~1b~0c").unwrap();
        assert_eq!(r.key.kind, ComponentKind::Responses);
        assert_eq!(r.key.name, "a/b~c");
    }

    #[test]
    fn test_parse_nested_pointer() {
        let r = parse_reference("#/components/schemas/Pet/properties/name").unwrap();
        assert_eq!(r.key.name, "Pet");
        assert_eq!(r.pointer, vec!["properties", "name"]);
        assert!(r.is_nested());
    }

    #[test]
    fn test_malformed_references() {
        for raw in [
            "Pet",
            "other.json#/components/schemas/Pet",
            "#/definitions/Pet",
            "#/components/widgets/Pet",
            "#/components/schemas/",
            "#/components/schemas/bad~2escape",
        ] {
            match parse_reference(raw) {
                Err(TypeModelError::MalformedReference { reference, .. }) => {
                    assert_eq!(reference, raw);
                }
                other => panic!("Expected MalformedReference for {}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_suggest_name() {
        let names = ["Pet", "Owner", "Order"];
        assert_eq!(suggest_name("Pett", names).as_deref(), Some("Pet"));
        assert_eq!(suggest_name("Ownr", names).as_deref(), Some("Owner"));
        assert_eq!(suggest_name("zzz", names), None);
    }
}
