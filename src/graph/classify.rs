//! Shape Classification
//!
//! Resolved, composition-free view of a schema node:
//! - `ResolvedShape` says what kind of value the node describes
//! - `UnionDescriptor` says how a `oneOf` / `anyOf` group is decoded
//!
//! Classification is language-agnostic. Child links are canonical `SchemaId`s
//! (every `$ref` already followed), so later passes never see a reference.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::compose::CompositionResolver;
use super::{
    AdditionalProperties, Bounds, Discriminator, JsonType, SchemaFlags, SchemaId, SchemaNode,
};
use crate::error::{ConflictError, Result, TypeModelError};

// =============================================================================
// Union Descriptor
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnionMode {
    OneOf,
    AnyOf,
}

impl UnionMode {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
        }
    }
}

/// How the active branch is picked at decode time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnionStrategy {
    /// One branch: a plain wrapper, no tag
    Single,
    /// Branches have distinct JSON kinds; the value's kind picks the branch
    ByKind,
    /// A property value picks the branch
    ByDiscriminator {
        property: String,
        /// Tag value → branch, mapping order then branch order
        mapping: Vec<(String, SchemaId)>,
    },
    /// Try each branch in declaration order; the first structural match wins
    Trial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionDescriptor {
    pub mode: UnionMode,
    pub nullable: bool,
    pub strategy: UnionStrategy,
    /// Non-null branches, declaration order
    pub branches: Vec<SchemaId>,
}

// =============================================================================
// Resolved Schema
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProperty {
    pub schema: SchemaId,
    pub required: bool,
}

/// Value shape after composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedShape {
    /// No structural information
    Any,
    Scalar { json_type: JsonType },
    Array { items: Option<SchemaId> },
    /// Free-form object; `values: None` means any value
    Map { values: Option<SchemaId> },
    Record {
        properties: IndexMap<String, ResolvedProperty>,
        /// `None` = open, `Some(Allowed(false))` = closed, `Some(Schema)` = typed extras
        additional: Option<AdditionalProperties>,
    },
    Union(UnionDescriptor),
    /// Same value as another node
    Alias { target: SchemaId },
}

impl ResolvedShape {
    /// Canonical child nodes, declaration order
    pub fn children(&self) -> Vec<SchemaId> {
        match self {
            Self::Any | Self::Scalar { .. } => Vec::new(),
            Self::Array { items } => items.iter().copied().collect(),
            Self::Map { values } => values.iter().copied().collect(),
            Self::Record {
                properties,
                additional,
            } => {
                let mut out: Vec<SchemaId> = properties.values().map(|p| p.schema).collect();
                if let Some(AdditionalProperties::Schema(id)) = additional {
                    out.push(*id);
                }
                out
            }
            Self::Union(u) => {
                let mut out = u.branches.clone();
                if let UnionStrategy::ByDiscriminator { mapping, .. } = &u.strategy {
                    for (_, id) in mapping {
                        if !out.contains(id) {
                            out.push(*id);
                        }
                    }
                }
                out
            }
            Self::Alias { target } => vec![*target],
        }
    }
}

/// Value constraints carried over from the merged node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Bounds::is_empty")]
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<serde_json::Value>,
}

impl Constraints {
    pub fn from_node(node: &SchemaNode) -> Self {
        Self {
            format: node.format.clone(),
            pattern: node.pattern.clone(),
            bounds: node.bounds.clone(),
            enum_values: node.enum_values.clone(),
        }
    }
}

/// One node after composition resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSchema {
    pub source: SchemaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub shape: ResolvedShape,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub flags: SchemaFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ResolvedSchema {
    pub fn is_nullable(&self) -> bool {
        match &self.shape {
            ResolvedShape::Union(u) => u.nullable || self.flags.nullable,
            _ => self.flags.nullable,
        }
    }

    /// An enumeration of scalar literals
    pub fn is_enum(&self) -> bool {
        matches!(self.shape, ResolvedShape::Scalar { .. }) && !self.constraints.enum_values.is_empty()
    }
}

/// Shape of a composition-free node
pub(crate) fn shape_of(node: &SchemaNode) -> ResolvedShape {
    match node.inferred_type() {
        None => match node.enum_values.first() {
            Some(v) => ResolvedShape::Scalar {
                json_type: literal_type(v),
            },
            None => ResolvedShape::Any,
        },
        Some(JsonType::Object) if node.properties.is_empty() => match node.additional_properties {
            Some(AdditionalProperties::Schema(id)) => ResolvedShape::Map { values: Some(id) },
            Some(AdditionalProperties::Allowed(false)) => ResolvedShape::Record {
                properties: IndexMap::new(),
                additional: Some(AdditionalProperties::Allowed(false)),
            },
            _ => ResolvedShape::Map { values: None },
        },
        Some(JsonType::Object) => ResolvedShape::Record {
            properties: node
                .properties
                .iter()
                .map(|(name, &schema)| {
                    let required = node.required.iter().any(|r| r == name);
                    (name.clone(), ResolvedProperty { schema, required })
                })
                .collect(),
            additional: match node.additional_properties {
                Some(AdditionalProperties::Allowed(true)) => None,
                other => other,
            },
        },
        Some(JsonType::Array) => ResolvedShape::Array { items: node.items },
        Some(json_type) => ResolvedShape::Scalar { json_type },
    }
}

fn literal_type(v: &serde_json::Value) -> JsonType {
    match v {
        serde_json::Value::Null => JsonType::Null,
        serde_json::Value::Bool(_) => JsonType::Boolean,
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
        serde_json::Value::Number(_) => JsonType::Number,
        serde_json::Value::String(_) => JsonType::String,
        serde_json::Value::Array(_) => JsonType::Array,
        serde_json::Value::Object(_) => JsonType::Object,
    }
}

// =============================================================================
// Union Classification
// =============================================================================

impl<'a> CompositionResolver<'a> {
    /// Classify a `oneOf` / `anyOf` group owned by `owner`.
    ///
    /// `{type: "null"}` branches are dropped and make the union nullable. The
    /// result has no branches when every branch was null.
    pub fn classify_union(
        &self,
        location: &str,
        owner: &SchemaNode,
        mode: UnionMode,
        branches: &[SchemaId],
    ) -> Result<UnionDescriptor> {
        let mut nullable = owner.flags.nullable;
        let mut kept: Vec<(SchemaId, SchemaId)> = Vec::with_capacity(branches.len());
        for &raw in branches {
            let canonical = self.document().canonical(raw)?;
            if is_null_branch(self.document().schema(canonical)) {
                nullable = true;
            } else {
                kept.push((raw, canonical));
            }
        }

        self.check_branch_discriminators(location, owner.discriminator.as_ref(), &kept)?;

        let canonical: Vec<SchemaId> = kept.iter().map(|(_, c)| *c).collect();
        let strategy = if canonical.len() <= 1 {
            UnionStrategy::Single
        } else if let Some(d) = &owner.discriminator {
            UnionStrategy::ByDiscriminator {
                property: d.property_name.clone(),
                mapping: self.discriminator_mapping(d, &kept)?,
            }
        } else if canonical.len() == 2 && self.distinct_kinds(canonical[0], canonical[1])? {
            UnionStrategy::ByKind
        } else {
            UnionStrategy::Trial
        };

        Ok(UnionDescriptor {
            mode,
            nullable,
            strategy,
            branches: canonical,
        })
    }

    /// Branch discriminators must agree with each other and with the union's own
    fn check_branch_discriminators(
        &self,
        location: &str,
        own: Option<&Discriminator>,
        branches: &[(SchemaId, SchemaId)],
    ) -> Result<()> {
        let mut seen: Option<&str> = own.map(|d| d.property_name.as_str());
        for &(_, branch) in branches {
            let Some(found) = self.effective_discriminator(branch)? else {
                continue;
            };
            match seen {
                Some(prev) if prev != found.property_name => {
                    return Err(TypeModelError::conflict(
                        location,
                        ConflictError::ConflictingDiscriminator(format!(
                            "{} vs {}",
                            prev, found.property_name
                        )),
                    ));
                }
                Some(_) => {}
                None => seen = Some(found.property_name.as_str()),
            }
        }
        Ok(())
    }

    /// First discriminator on the node or anywhere in its `allOf` chain
    fn effective_discriminator(&self, id: SchemaId) -> Result<Option<&'a Discriminator>> {
        for part in self.flatten(id)? {
            if let Some(d) = &self.document().schema(part).discriminator {
                return Ok(Some(d));
            }
        }
        Ok(None)
    }

    fn discriminator_mapping(
        &self,
        d: &Discriminator,
        branches: &[(SchemaId, SchemaId)],
    ) -> Result<Vec<(String, SchemaId)>> {
        let doc = self.document();
        let mut mapping: Vec<(String, SchemaId)> = Vec::new();
        for (value, target) in &d.mapping {
            let id = if target.starts_with('#') {
                doc.resolve_schema_ref(target)?
            } else {
                doc.resolve_schema_ref(&format!("#/components/schemas/{}", target))?
            };
            mapping.push((value.clone(), doc.canonical(id)?));
        }

        let mapped: HashSet<SchemaId> = mapping.iter().map(|(_, id)| *id).collect();
        for &(raw, canonical) in branches {
            if mapped.contains(&canonical) {
                continue;
            }
            // Implicit value: the referenced component's name
            if let Some(name) = doc
                .schema(raw)
                .reference
                .as_deref()
                .and_then(|r| super::parse_reference(r).ok())
                .map(|r| r.key.name)
            {
                mapping.push((name, canonical));
            }
        }
        Ok(mapping)
    }

    /// True when two branches can be told apart by JSON kind alone
    fn distinct_kinds(&self, a: SchemaId, b: SchemaId) -> Result<bool> {
        let (ka, kb) = (self.effective_kind(a)?, self.effective_kind(b)?);
        Ok(match (ka, kb) {
            (Some(x), Some(y)) => x != y && !is_numeric_pair(x, y),
            _ => false,
        })
    }

    /// JSON kind of a node, looking through `allOf` and single-branch unions
    fn effective_kind(&self, id: SchemaId) -> Result<Option<JsonType>> {
        let mut seen = HashSet::new();
        self.effective_kind_inner(id, &mut seen)
    }

    fn effective_kind_inner(&self, id: SchemaId, seen: &mut HashSet<SchemaId>) -> Result<Option<JsonType>> {
        let id = self.document().canonical(id)?;
        if !seen.insert(id) {
            return Ok(None);
        }
        for part in self.flatten(id)? {
            let node = self.document().schema(part);
            if let Some(kind) = node.inferred_type() {
                return Ok(Some(kind));
            }
            let union = if node.one_of.is_empty() { &node.any_of } else { &node.one_of };
            if union.len() == 1 {
                return self.effective_kind_inner(union[0], seen);
            }
        }
        Ok(None)
    }
}

fn is_null_branch(node: &SchemaNode) -> bool {
    node.json_type == Some(JsonType::Null)
}

fn is_numeric_pair(a: JsonType, b: JsonType) -> bool {
    matches!(
        (a, b),
        (JsonType::Integer, JsonType::Number) | (JsonType::Number, JsonType::Integer)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{load_from_value, Document};
    use serde_json::json;

    fn doc(schemas: serde_json::Value) -> Document {
        load_from_value(&json!({ "components": { "schemas": schemas } })).unwrap()
    }

    fn classify(doc: &Document, name: &str) -> Result<UnionDescriptor> {
        let resolver = CompositionResolver::new(doc, false);
        let node = doc.schema(doc.components.schemas[name]);
        let (mode, branches) = if node.one_of.is_empty() {
            (UnionMode::AnyOf, &node.any_of)
        } else {
            (UnionMode::OneOf, &node.one_of)
        };
        resolver.classify_union(name, node, mode, branches)
    }

    #[test]
    fn test_single_branch_with_null_is_nullable_wrapper() {
        let d = doc(json!({
            "Maybe": { "oneOf": [{ "$ref": "#/components/schemas/Pet" }, { "type": "null" }] },
            "Pet": { "type": "object", "properties": { "name": { "type": "string" } } }
        }));
        let u = classify(&d, "Maybe").unwrap();
        assert_eq!(u.strategy, UnionStrategy::Single);
        assert!(u.nullable);
        assert_eq!(u.branches, vec![d.components.schemas["Pet"]]);
    }

    #[test]
    fn test_two_distinct_kinds_dispatch_by_kind() {
        let d = doc(json!({
            "IdOrName": { "oneOf": [{ "type": "integer" }, { "type": "string" }] }
        }));
        assert_eq!(classify(&d, "IdOrName").unwrap().strategy, UnionStrategy::ByKind);
    }

    #[test]
    fn test_ambiguous_pairs_use_trial() {
        let d = doc(json!({
            "Numbers": { "anyOf": [{ "type": "integer" }, { "type": "number" }] },
            "Objects": { "oneOf": [
                { "type": "object", "properties": { "a": { "type": "string" } } },
                { "type": "object", "properties": { "b": { "type": "string" } } }
            ]},
            "Three": { "oneOf": [{ "type": "string" }, { "type": "integer" }, { "type": "boolean" }] }
        }));
        let numbers = classify(&d, "Numbers").unwrap();
        assert_eq!(numbers.mode, UnionMode::AnyOf);
        assert_eq!(numbers.strategy, UnionStrategy::Trial);
        assert_eq!(classify(&d, "Objects").unwrap().strategy, UnionStrategy::Trial);
        assert_eq!(classify(&d, "Three").unwrap().strategy, UnionStrategy::Trial);
    }

    #[test]
    fn test_discriminator_mapping_explicit_and_implicit() {
        let d = doc(json!({
            "Pet": {
                "oneOf": [
                    { "$ref": "#/components/schemas/Cat" },
                    { "$ref": "#/components/schemas/Dog" }
                ],
                "discriminator": {
                    "propertyName": "petType",
                    "mapping": { "kitty": "#/components/schemas/Cat" }
                }
            },
            "Cat": { "type": "object", "properties": { "petType": { "type": "string" } } },
            "Dog": { "type": "object", "properties": { "petType": { "type": "string" } } }
        }));
        let u = classify(&d, "Pet").unwrap();
        let cat = d.components.schemas["Cat"];
        let dog = d.components.schemas["Dog"];
        assert_eq!(
            u.strategy,
            UnionStrategy::ByDiscriminator {
                property: "petType".into(),
                mapping: vec![("kitty".into(), cat), ("Dog".into(), dog)],
            }
        );
    }

    #[test]
    fn test_branch_discriminator_disagreement_conflicts() {
        let d = doc(json!({
            "Pet": {
                "oneOf": [
                    { "$ref": "#/components/schemas/Cat" },
                    { "$ref": "#/components/schemas/Dog" }
                ],
                "discriminator": { "propertyName": "petType" }
            },
            "Cat": { "type": "object", "discriminator": { "propertyName": "kind" } },
            "Dog": { "type": "object" }
        }));
        match classify(&d, "Pet") {
            Err(TypeModelError::StructuralConflict { conflict, .. }) => {
                assert_eq!(
                    conflict,
                    ConflictError::ConflictingDiscriminator("petType vs kind".into())
                );
            }
            other => panic!("Expected ConflictingDiscriminator, got {:?}", other),
        }
    }

    #[test]
    fn test_shape_of_objects() {
        let d = doc(json!({
            "Free": { "type": "object" },
            "Dict": { "type": "object", "additionalProperties": { "type": "integer" } },
            "Closed": { "type": "object", "additionalProperties": false,
                        "required": ["id"], "properties": { "id": { "type": "string" } } },
            "Letters": { "enum": ["a", "b"] }
        }));
        let shape = |n: &str| shape_of(d.schema(d.components.schemas[n]));
        assert_eq!(shape("Free"), ResolvedShape::Map { values: None });
        assert!(matches!(shape("Dict"), ResolvedShape::Map { values: Some(_) }));
        match shape("Closed") {
            ResolvedShape::Record { properties, additional } => {
                assert!(properties["id"].required);
                assert_eq!(additional, Some(AdditionalProperties::Allowed(false)));
            }
            other => panic!("Expected Record, got {:?}", other),
        }
        assert_eq!(shape("Letters"), ResolvedShape::Scalar { json_type: JsonType::String });
    }
}
