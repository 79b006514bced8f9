//! Name Assignment Pass
//!
//! Binds a unique, identifier-safe type name to every resolved node that
//! becomes its own type:
//! - named schema components first, in declaration order
//! - alias components reuse the name of the node they denote
//! - inline records, unions and enums get names derived from their parent
//!
//! Collisions are settled with a per-base occurrence counter: the first user of
//! a base name gets it bare, later users get `0`, `1`, `2`, … Assignments are
//! never retracted or handed to another node within a run.

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;

use super::config::NamingConfig;
use crate::error::{Result, TypeModelError};
use crate::graph::{
    AdditionalProperties, DiagnosticCode, DiagnosticItem, Diagnostics, Document, ResolvedModel,
    ResolvedSchema, ResolvedShape, SchemaId, SchemaOrigin, SchemaRoot,
};

// =============================================================================
// Type Identity
// =============================================================================

/// Why a node got its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    /// `components.schemas.<name>`
    Component,
    /// Inline schema of an operation or a non-schema component
    Operation,
    /// Built from the enclosing type's name
    Derived,
}

/// The name bound to one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeIdentity {
    pub name: String,
    pub node: SchemaId,
    /// Normalized name before any collision suffix
    pub base: String,
    pub suffix: Option<usize>,
    pub source: NameSource,
}

// =============================================================================
// Registry
// =============================================================================

pub struct TypeNameRegistry {
    naming: NamingConfig,

    /// node -> index into `identities`
    by_node: HashMap<SchemaId, usize>,

    /// name -> node
    by_name: HashMap<String, SchemaId>,

    /// Assignment order
    identities: Vec<TypeIdentity>,

    /// base name -> times requested
    occurrences: HashMap<String, usize>,

    /// Schema component name -> canonical node
    components: IndexMap<String, SchemaId>,
}

impl TypeNameRegistry {
    pub fn new(naming: NamingConfig) -> Self {
        Self {
            naming,
            by_node: HashMap::new(),
            by_name: HashMap::new(),
            identities: Vec::new(),
            occurrences: HashMap::new(),
            components: IndexMap::new(),
        }
    }

    /// Name every node of `resolved` that needs its own type.
    ///
    /// `roots` must be in `Document::schema_roots` order; that order is what
    /// makes the suffixes deterministic.
    pub fn build(
        doc: &Document,
        roots: &[SchemaRoot],
        resolved: &ResolvedModel,
        naming: NamingConfig,
    ) -> Result<(Self, Diagnostics)> {
        let mut registry = Self::new(naming);
        let mut diagnostics = Diagnostics::new();

        // Pass 1: schema components. Targets before aliases so an alias never
        // claims the name of the component it points at.
        let mut aliases = Vec::new();
        for root in roots {
            let SchemaOrigin::Component(name) = &root.origin else {
                continue;
            };
            let canonical = doc.canonical(root.schema)?;
            if canonical != root.schema {
                aliases.push((name, canonical));
                continue;
            }
            let base = registry.normalize(name);
            registry.assign(canonical, base, NameSource::Component, &mut diagnostics)?;
            registry.components.insert(name.clone(), canonical);
        }
        for (name, canonical) in aliases {
            if !registry.by_node.contains_key(&canonical) {
                let base = registry.normalize(name);
                registry.assign(canonical, base, NameSource::Component, &mut diagnostics)?;
            }
            registry.components.insert(name.clone(), canonical);
        }

        // Pass 2: everything reachable from the roots
        let mut walker = Walker {
            registry: &mut registry,
            resolved,
            visited: HashSet::new(),
            diagnostics: &mut diagnostics,
        };
        for root in roots {
            let canonical = doc.canonical(root.schema)?;
            let (hint, source) = match &root.origin {
                SchemaOrigin::Component(name) => (walker.registry.normalize(name), NameSource::Component),
                origin => (walker.registry.normalize(&origin.name_hint()), NameSource::Operation),
            };
            walker.visit(canonical, hint, source)?;
        }

        Ok((registry, diagnostics))
    }

    /// Bind `base` (or the next free suffixed form of it) to `node`.
    ///
    /// A node that already has a name keeps it.
    pub fn assign(
        &mut self,
        node: SchemaId,
        base: String,
        source: NameSource,
        diagnostics: &mut Diagnostics,
    ) -> Result<&TypeIdentity> {
        if let Some(&index) = self.by_node.get(&node) {
            return Ok(&self.identities[index]);
        }

        let counter = self.occurrences.entry(base.clone()).or_insert(0);
        let limit = self.by_name.len() + self.naming.reserved.len() + 1;
        let mut chosen = None;
        for _ in 0..=limit {
            let suffix = counter.checked_sub(1);
            *counter += 1;
            let candidate = match suffix {
                None => base.clone(),
                Some(n) => format!("{}{}", base, n),
            };
            if !self.by_name.contains_key(&candidate) && !self.naming.reserved.contains(&candidate) {
                chosen = Some((candidate, suffix));
                break;
            }
        }
        let Some((name, suffix)) = chosen else {
            return Err(TypeModelError::NamingCollisionUnresolved { base });
        };

        if suffix.is_some() {
            diagnostics.push(DiagnosticItem::new(
                node.to_string(),
                DiagnosticCode::NameSuffixed,
                format!("'{}' is taken, using '{}'", base, name),
            ));
        }

        self.by_name.insert(name.clone(), node);
        self.by_node.insert(node, self.identities.len());
        self.identities.push(TypeIdentity {
            name,
            node,
            base,
            suffix,
            source,
        });
        Ok(&self.identities[self.identities.len() - 1])
    }

    /// Turn a source name into an identifier-safe PascalCase name
    pub fn normalize(&self, raw: &str) -> String {
        let mut name = self.to_pascal_case(raw);
        if name.is_empty() {
            return self.naming.safe_prefix.clone();
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            name.insert_str(0, &self.naming.safe_prefix);
        }
        if is_keyword(&name) {
            name.push('_');
        }
        name
    }

    /// PascalCase without the safe prefix; used for suffixes glued onto an
    /// already safe parent name
    fn to_pascal_case(&self, s: &str) -> String {
        let words: Vec<&str> = s
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        words.iter().map(|w| self.case_word(w)).collect()
    }

    /// Apply casing to a word, preserving acronyms
    fn case_word(&self, word: &str) -> String {
        let upper = word.to_ascii_uppercase();
        if self.naming.acronyms.contains(&upper) {
            return upper;
        }

        let mut chars = word.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        }
    }

    pub fn get(&self, node: SchemaId) -> Option<&TypeIdentity> {
        self.by_node.get(&node).map(|&i| &self.identities[i])
    }

    pub fn name_of(&self, node: SchemaId) -> Option<&str> {
        self.get(node).map(|t| t.name.as_str())
    }

    pub fn node_of(&self, name: &str) -> Option<SchemaId> {
        self.by_name.get(name).copied()
    }

    /// Identity of a schema component, by its declared name
    pub fn component(&self, name: &str) -> Option<&TypeIdentity> {
        self.components.get(name).and_then(|&node| self.get(node))
    }

    /// Assignment order
    pub fn iter(&self) -> impl Iterator<Item = &TypeIdentity> {
        self.identities.iter()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// name -> node, sorted by name
    pub fn table(&self) -> BTreeMap<&str, SchemaId> {
        self.identities
            .iter()
            .map(|t| (t.name.as_str(), t.node))
            .collect()
    }
}

/// Whether an inline node gets a type of its own
pub fn needs_type(schema: &ResolvedSchema) -> bool {
    match &schema.shape {
        ResolvedShape::Record { .. } => true,
        ResolvedShape::Union(u) => u.branches.len() > 1,
        ResolvedShape::Scalar { .. } => schema.is_enum(),
        _ => false,
    }
}

struct Walker<'r, 'm> {
    registry: &'r mut TypeNameRegistry,
    resolved: &'m ResolvedModel,
    visited: HashSet<SchemaId>,
    diagnostics: &'r mut Diagnostics,
}

impl<'r, 'm> Walker<'r, 'm> {
    fn visit(&mut self, node: SchemaId, hint: String, source: NameSource) -> Result<()> {
        if !self.visited.insert(node) {
            return Ok(());
        }
        let resolved = self.resolved;
        let Some(schema) = resolved.get(node) else {
            return Ok(());
        };

        let name = match self.registry.name_of(node) {
            Some(existing) => existing.to_string(),
            None if needs_type(schema) => self
                .registry
                .assign(node, hint, source, self.diagnostics)?
                .name
                .clone(),
            // Unnamed nodes pass the hint through to their children
            None => hint,
        };

        match &schema.shape {
            ResolvedShape::Record {
                properties,
                additional,
            } => {
                for (prop, p) in properties {
                    let hint = self.child_hint(p.schema, &name, prop);
                    self.visit(p.schema, hint, NameSource::Derived)?;
                }
                if let Some(AdditionalProperties::Schema(values)) = additional {
                    let hint = self.child_hint(*values, &name, "Value");
                    self.visit(*values, hint, NameSource::Derived)?;
                }
            }
            ResolvedShape::Array { items: Some(items) } => {
                let hint = self.child_hint(*items, &name, "Item");
                self.visit(*items, hint, NameSource::Derived)?;
            }
            ResolvedShape::Map { values: Some(values) } => {
                let hint = self.child_hint(*values, &name, "Value");
                self.visit(*values, hint, NameSource::Derived)?;
            }
            ResolvedShape::Alias { target } => {
                self.visit(*target, name, source)?;
            }
            ResolvedShape::Union(_) => {
                for (i, child) in schema.shape.children().into_iter().enumerate() {
                    let hint = self.child_hint(child, &name, &format!("Variant{}", i));
                    self.visit(child, hint, NameSource::Derived)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// A titled child uses its title, otherwise `parent + suffix`
    fn child_hint(&self, child: SchemaId, parent: &str, suffix: &str) -> String {
        match self.resolved.get(child).and_then(|s| s.title.as_deref()) {
            Some(title) if !self.registry.to_pascal_case(title).is_empty() => {
                self.registry.normalize(title)
            }
            _ => format!("{}{}", parent, self.registry.to_pascal_case(suffix)),
        }
    }
}

/// Check if a string is a Rust keyword
pub(crate) fn is_keyword(s: &str) -> bool {
    matches!(
        s,
        "as" | "async" | "await" | "break" | "const" | "continue" | "crate" | "dyn" |
        "else" | "enum" | "extern" | "false" | "fn" | "for" | "if" | "impl" |
        "in" | "let" | "loop" | "match" | "mod" | "move" | "mut" | "pub" |
        "ref" | "return" | "self" | "Self" | "static" | "struct" | "super" |
        "trait" | "true" | "type" | "unsafe" | "use" | "where" | "while" |
        // Reserved for future use
        "abstract" | "become" | "box" | "do" | "final" | "macro" | "override" |
        "priv" | "try" | "typeof" | "unsized" | "virtual" | "yield"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{load_from_value, CompositionResolver};
    use serde_json::json;

    fn registry() -> TypeNameRegistry {
        TypeNameRegistry::new(NamingConfig::default())
    }

    fn name_document(spec: serde_json::Value) -> (Document, TypeNameRegistry) {
        let doc = load_from_value(&spec).unwrap();
        let mut diagnostics = Diagnostics::new();
        let roots = doc.schema_roots(&mut diagnostics).unwrap();
        let (resolved, _) = CompositionResolver::new(&doc, false).resolve(&roots).unwrap();
        let (names, _) =
            TypeNameRegistry::build(&doc, &roots, &resolved, NamingConfig::default()).unwrap();
        (doc, names)
    }

    #[test]
    fn test_normalize() {
        let r = registry();
        assert_eq!(r.normalize("pet_store"), "PetStore");
        assert_eq!(r.normalize("petStore"), "PetStore");
        assert_eq!(r.normalize("user-id"), "UserID");
        assert_eq!(r.normalize("api_url"), "APIURL");
        assert_eq!(r.normalize("a.b c"), "ABC");
        assert_eq!(r.normalize("self"), "Self_");
        assert_eq!(r.normalize("400"), "T400");
        assert_eq!(r.normalize("/"), "T");
    }

    #[test]
    fn test_suffix_counter() {
        let mut r = registry();
        let mut d = Diagnostics::new();
        let ids: Vec<SchemaId> = (0..3).map(SchemaId::from_raw).collect();

        assert_eq!(r.assign(ids[0], "Item".into(), NameSource::Derived, &mut d).unwrap().name, "Item");
        assert_eq!(r.assign(ids[1], "Item".into(), NameSource::Derived, &mut d).unwrap().name, "Item0");
        assert_eq!(r.assign(ids[2], "Item".into(), NameSource::Derived, &mut d).unwrap().name, "Item1");

        // Re-assigning never changes a name
        assert_eq!(r.assign(ids[0], "Other".into(), NameSource::Derived, &mut d).unwrap().name, "Item");
        assert_eq!(d.with_code(DiagnosticCode::NameSuffixed).count(), 2);
    }

    #[test]
    fn test_suffix_skips_taken_and_reserved() {
        let mut r = registry();
        let mut d = Diagnostics::new();
        let ids: Vec<SchemaId> = (0..4).map(SchemaId::from_raw).collect();

        r.assign(ids[0], "Item0".into(), NameSource::Component, &mut d).unwrap();
        r.assign(ids[1], "Item".into(), NameSource::Component, &mut d).unwrap();
        assert_eq!(r.assign(ids[2], "Item".into(), NameSource::Derived, &mut d).unwrap().name, "Item1");
        assert_eq!(r.assign(ids[3], "String".into(), NameSource::Component, &mut d).unwrap().name, "String0");
    }

    #[test]
    fn test_numeric_component_prefix_inherited() {
        let (_, names) = name_document(json!({
            "components": { "schemas": {
                "400": {
                    "type": "array",
                    "items": { "type": "object", "properties": { "code": { "type": "integer" } } }
                }
            }}
        }));
        let top = names.component("400").unwrap();
        assert_eq!(top.name, "T400");
        assert!(names.node_of("T400Item").is_some());
    }

    #[test]
    fn test_sibling_titles_get_suffix() {
        let (_, names) = name_document(json!({
            "components": { "schemas": {
                "Order": {
                    "type": "object",
                    "properties": {
                        "first": { "title": "Item", "type": "object", "properties": { "a": { "type": "string" } } },
                        "second": { "title": "Item", "type": "object", "properties": { "b": { "type": "string" } } }
                    }
                }
            }}
        }));
        let item = names.node_of("Item").unwrap();
        let item0 = names.node_of("Item0").unwrap();
        assert_ne!(item, item0);
        assert_eq!(names.name_of(item), Some("Item"));
        assert_eq!(names.get(item0).unwrap().suffix, Some(0));
    }

    #[test]
    fn test_alias_component_reuses_name() {
        let (_, names) = name_document(json!({
            "components": { "schemas": {
                "PetAlias": { "$ref": "#/components/schemas/Pet" },
                "Pet": { "type": "object", "properties": { "name": { "type": "string" } } }
            }}
        }));
        assert_eq!(names.component("PetAlias").unwrap().name, "Pet");
        assert!(names.node_of("PetAlias").is_none());
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_derived_and_operation_names() {
        let (_, names) = name_document(json!({
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "createPet",
                        "requestBody": { "content": { "application/json": { "schema": {
                            "type": "object",
                            "properties": {
                                "owner": { "type": "object", "properties": { "id": { "type": "string" } } },
                                "status": { "type": "string", "enum": ["a", "b"] },
                                "tags": { "type": "array", "items": { "type": "object", "properties": { "n": { "type": "string" } } } }
                            }
                        }}}},
                        "responses": {}
                    }
                }
            }
        }));
        for expected in [
            "CreatePetRequest",
            "CreatePetRequestOwner",
            "CreatePetRequestStatus",
            "CreatePetRequestTagsItem",
        ] {
            assert!(names.node_of(expected).is_some(), "missing {}", expected);
        }
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_names_are_unique() {
        let (_, names) = name_document(json!({
            "components": { "schemas": {
                "A": { "type": "object", "properties": { "x": { "type": "object", "properties": { "n": { "type": "string" } } } } },
                "AX": { "type": "object", "properties": { "m": { "type": "string" } } }
            }}
        }));
        let mut seen = HashSet::new();
        for identity in names.iter() {
            assert!(seen.insert(identity.name.clone()));
        }
        assert!(names.node_of("AX0").is_some());
    }
}
