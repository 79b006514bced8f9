//! Composition Resolution
//!
//! Flattens `allOf` chains into a single node and turns every reachable schema
//! into a `ResolvedSchema`. Nested `allOf` is transparent: a branch that is
//! itself composed is flattened before merging, and the node carrying `allOf`
//! contributes its own keywords as the last branch.
//!
//! `resolve_node` is a pure function of the document, so the walk resolves
//! each breadth-first wave in parallel and collects results in wave order.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::classify::{shape_of, Constraints, ResolvedSchema, ResolvedShape, UnionMode, UnionStrategy};
use super::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use super::{AdditionalProperties, Bounds, Document, JsonType, SchemaId, SchemaNode, SchemaRoot};
use crate::error::{ConflictError, Result, TypeModelError};

// =============================================================================
// Pairwise merge
// =============================================================================

/// Result of merging several `allOf` branches
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub node: SchemaNode,
    /// Properties defined by more than one branch with different schemas
    pub overridden: Vec<String>,
}

/// Merge composition-free nodes left to right.
///
/// Child ids are compared as given; callers pass canonical ids so that two
/// references to the same component count as the same schema.
pub fn merge_nodes(nodes: &[SchemaNode]) -> std::result::Result<MergeOutcome, ConflictError> {
    let mut iter = nodes.iter();
    let mut acc = match iter.next() {
        Some(first) => first.clone(),
        None => SchemaNode::default(),
    };
    acc.all_of.clear();
    acc.reference = None;

    let mut overridden = Vec::new();
    for next in iter {
        merge_pair(&mut acc, next, &mut overridden)?;
    }
    Ok(MergeOutcome {
        node: acc,
        overridden,
    })
}

fn merge_pair(
    acc: &mut SchemaNode,
    next: &SchemaNode,
    overridden: &mut Vec<String>,
) -> std::result::Result<(), ConflictError> {
    acc.json_type = merge_kind(acc, next)?;
    acc.title = acc.title.take().or_else(|| next.title.clone());
    acc.format = same_or_either("format", acc.format.take(), &next.format)?;
    acc.pattern = same_or_either("pattern", acc.pattern.take(), &next.pattern)?;
    merge_bounds(&mut acc.bounds, &next.bounds)?;

    if acc.flags != next.flags {
        let name = acc
            .flags
            .named()
            .into_iter()
            .zip(next.flags.named())
            .find(|(a, b)| a.1 != b.1)
            .map(|(a, _)| a.0)
            .unwrap_or("flags");
        return Err(ConflictError::ConflictingFlag(name));
    }

    for value in &next.enum_values {
        if !acc.enum_values.contains(value) {
            acc.enum_values.push(value.clone());
        }
    }

    acc.default = match (acc.default.take(), &next.default) {
        (Some(left), Some(right)) if &left != right => {
            return Err(ConflictError::ConflictingDefaults {
                left,
                right: right.clone(),
            })
        }
        (Some(left), _) => Some(left),
        (None, right) => right.clone(),
    };

    for (name, &id) in &next.properties {
        if let Some(prev) = acc.properties.insert(name.clone(), id) {
            if prev != id && !overridden.contains(name) {
                overridden.push(name.clone());
            }
        }
    }
    for name in &next.required {
        if !acc.required.contains(name) {
            acc.required.push(name.clone());
        }
    }

    if next.items.is_some() {
        acc.items = next.items;
    }
    acc.additional_properties = merge_additional(acc.additional_properties, next.additional_properties)?;

    acc.discriminator = match (acc.discriminator.take(), &next.discriminator) {
        (Some(left), Some(right)) if &left != right => {
            let detail = if left.property_name == right.property_name {
                format!("{} (different mappings)", left.property_name)
            } else {
                format!("{} vs {}", left.property_name, right.property_name)
            };
            return Err(ConflictError::ConflictingDiscriminator(detail));
        }
        (Some(left), _) => Some(left),
        (None, right) => right.clone(),
    };

    acc.one_of = merge_union("oneOf", std::mem::take(&mut acc.one_of), &next.one_of)?;
    acc.any_of = merge_union("anyOf", std::mem::take(&mut acc.any_of), &next.any_of)?;
    acc.example = acc.example.take().or_else(|| next.example.clone());
    Ok(())
}

fn merge_kind(acc: &SchemaNode, next: &SchemaNode) -> std::result::Result<Option<JsonType>, ConflictError> {
    match (acc.inferred_type(), next.inferred_type()) {
        (Some(a), Some(b)) if a == b => Ok(acc.json_type.or(next.json_type)),
        (Some(JsonType::Integer), Some(JsonType::Number))
        | (Some(JsonType::Number), Some(JsonType::Integer)) => Ok(Some(JsonType::Integer)),
        (Some(a), Some(b)) => Err(ConflictError::IncompatibleTypes {
            left: a.to_string(),
            right: b.to_string(),
        }),
        _ => Ok(acc.json_type.or(next.json_type)),
    }
}

fn same_or_either(
    keyword: &'static str,
    left: Option<String>,
    right: &Option<String>,
) -> std::result::Result<Option<String>, ConflictError> {
    match (left, right) {
        (Some(l), Some(r)) if &l != r => Err(ConflictError::ConflictingFlag(keyword)),
        (Some(l), _) => Ok(Some(l)),
        (None, r) => Ok(r.clone()),
    }
}

fn merge_bounds(acc: &mut Bounds, next: &Bounds) -> std::result::Result<(), ConflictError> {
    fn lower<T: PartialOrd + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
        match (a, b) {
            (Some(x), Some(y)) => Some(if y > x { y } else { x }),
            (x, y) => x.or(y),
        }
    }
    fn upper<T: PartialOrd + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
        match (a, b) {
            (Some(x), Some(y)) => Some(if y < x { y } else { x }),
            (x, y) => x.or(y),
        }
    }

    acc.minimum = lower(acc.minimum, next.minimum);
    acc.maximum = upper(acc.maximum, next.maximum);
    acc.min_length = lower(acc.min_length, next.min_length);
    acc.max_length = upper(acc.max_length, next.max_length);
    acc.min_items = lower(acc.min_items, next.min_items);
    acc.max_items = upper(acc.max_items, next.max_items);
    acc.min_properties = lower(acc.min_properties, next.min_properties);
    acc.max_properties = upper(acc.max_properties, next.max_properties);
    acc.multiple_of = match (acc.multiple_of, next.multiple_of) {
        (Some(a), Some(b)) if a != b => return Err(ConflictError::ConflictingFlag("multipleOf")),
        (a, b) => a.or(b),
    };
    Ok(())
}

fn merge_additional(
    left: Option<AdditionalProperties>,
    right: Option<AdditionalProperties>,
) -> std::result::Result<Option<AdditionalProperties>, ConflictError> {
    use AdditionalProperties::{Allowed, Schema};
    match (left, right) {
        (Some(Allowed(false)), _) | (_, Some(Allowed(false))) => Ok(Some(Allowed(false))),
        (Some(Schema(a)), Some(Schema(b))) if a != b => {
            Err(ConflictError::ConflictingAdditionalProperties)
        }
        (Some(Schema(s)), _) | (_, Some(Schema(s))) => Ok(Some(Schema(s))),
        (Some(Allowed(true)), _) | (_, Some(Allowed(true))) => Ok(Some(Allowed(true))),
        (None, None) => Ok(None),
    }
}

fn merge_union(
    keyword: &'static str,
    left: Vec<SchemaId>,
    right: &[SchemaId],
) -> std::result::Result<Vec<SchemaId>, ConflictError> {
    if left.is_empty() {
        Ok(right.to_vec())
    } else if right.is_empty() || left == right {
        Ok(left)
    } else {
        Err(ConflictError::IncompatibleTypes {
            left: keyword.to_string(),
            right: keyword.to_string(),
        })
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Every resolved node, keyed by canonical id
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedModel {
    nodes: BTreeMap<SchemaId, ResolvedSchema>,
    /// Discovery order
    order: Vec<SchemaId>,
}

impl ResolvedModel {
    pub fn get(&self, id: SchemaId) -> Option<&ResolvedSchema> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: SchemaId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedSchema> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Resolves composition over a borrowed document
pub struct CompositionResolver<'a> {
    doc: &'a Document,
    strict: bool,
    labels: HashMap<SchemaId, String>,
}

impl<'a> CompositionResolver<'a> {
    /// `strict` escalates property overrides to errors
    pub fn new(doc: &'a Document, strict: bool) -> Self {
        Self {
            doc,
            strict,
            labels: doc.schema_pointers(),
        }
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// JSON pointer of a node for error messages
    pub fn location(&self, id: SchemaId) -> String {
        self.labels
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Resolve everything reachable from `roots`
    pub fn resolve(&self, roots: &[SchemaRoot]) -> Result<(ResolvedModel, Diagnostics)> {
        let mut model = ResolvedModel::default();
        let mut diagnostics = Diagnostics::new();
        let mut seen = HashSet::new();

        let mut frontier = Vec::new();
        for root in roots {
            let id = self.doc.canonical(root.schema)?;
            if seen.insert(id) {
                frontier.push(id);
            }
        }

        while !frontier.is_empty() {
            let wave: Vec<(ResolvedSchema, Vec<DiagnosticItem>)> = frontier
                .par_iter()
                .map(|&id| self.resolve_node(id))
                .collect::<Result<_>>()?;

            let mut next = Vec::new();
            for (resolved, items) in wave {
                diagnostics.extend(items);
                for child in resolved.shape.children() {
                    if seen.insert(child) {
                        next.push(child);
                    }
                }
                model.order.push(resolved.source);
                model.nodes.insert(resolved.source, resolved);
            }
            frontier = next;
        }

        Ok((model, diagnostics))
    }

    /// Resolve one node: merge its `allOf`, classify its union, derive its shape
    pub fn resolve_node(&self, id: SchemaId) -> Result<(ResolvedSchema, Vec<DiagnosticItem>)> {
        let doc = self.doc;
        let id = doc.canonical(id)?;
        let node = doc.schema(id);
        let location = self.location(id);

        // `allOf: [$ref]` with nothing else is another name for the target
        if node.is_bare_all_of() && node.all_of.len() == 1 && doc.schema(node.all_of[0]).is_reference() {
            let target = doc.canonical(node.all_of[0])?;
            return Ok((
                ResolvedSchema {
                    source: id,
                    title: node.title.clone(),
                    shape: ResolvedShape::Alias { target },
                    constraints: Constraints::default(),
                    flags: Default::default(),
                    default: None,
                },
                Vec::new(),
            ));
        }

        let mut diagnostics = Vec::new();
        let merged = if node.all_of.is_empty() {
            self.local_view(id)?
        } else {
            let (merged, items) = self.merge_all_of(id)?;
            diagnostics.extend(items);
            merged
        };

        let shape = if merged.one_of.is_empty() && merged.any_of.is_empty() {
            shape_of(&merged)
        } else {
            let (mode, branches) = if merged.one_of.is_empty() {
                (UnionMode::AnyOf, &merged.any_of)
            } else {
                (UnionMode::OneOf, &merged.one_of)
            };
            let union = self.classify_union(&location, &merged, mode, branches)?;
            if union.branches.is_empty() {
                ResolvedShape::Scalar {
                    json_type: JsonType::Null,
                }
            } else {
                if union.strategy == UnionStrategy::Trial {
                    diagnostics.push(DiagnosticItem::new(
                        location.clone(),
                        DiagnosticCode::TrialUnion,
                        format!(
                            "{} with {} branches has no cheap dispatch; branches are tried in order",
                            mode.keyword(),
                            union.branches.len()
                        ),
                    ));
                }
                ResolvedShape::Union(union)
            }
        };

        Ok((
            ResolvedSchema {
                source: id,
                title: node.title.clone(),
                shape,
                constraints: Constraints::from_node(&merged),
                flags: merged.flags,
                default: merged.default.clone(),
            },
            diagnostics,
        ))
    }

    /// Merge the `allOf` chain rooted at `id` into one composition-free node
    pub fn merge_all_of(&self, id: SchemaId) -> Result<(SchemaNode, Vec<DiagnosticItem>)> {
        let parts = self.flatten(id)?;
        let locals = parts
            .iter()
            .map(|&p| self.local_view(p))
            .collect::<Result<Vec<_>>>()?;
        let location = self.location(id);
        let outcome = merge_nodes(&locals).map_err(|c| TypeModelError::conflict(location.clone(), c))?;

        let items = outcome
            .overridden
            .iter()
            .map(|name| {
                let item = DiagnosticItem::new(
                    location.clone(),
                    DiagnosticCode::PropertyOverride,
                    format!(
                        "property '{}' is defined by more than one allOf branch; the last definition wins",
                        name
                    ),
                );
                if self.strict {
                    item.escalated()
                } else {
                    item
                }
            })
            .collect();
        Ok((outcome.node, items))
    }

    /// Content-bearing nodes of an `allOf` chain, branch order, owner last.
    ///
    /// References are followed; a node already on the chain is skipped, which
    /// makes diamonds idempotent and cycles terminate.
    pub fn flatten(&self, id: SchemaId) -> Result<Vec<SchemaId>> {
        let mut out = Vec::new();
        let mut visiting = HashSet::new();
        self.flatten_into(id, &mut out, &mut visiting)?;
        Ok(out)
    }

    fn flatten_into(&self, id: SchemaId, out: &mut Vec<SchemaId>, visiting: &mut HashSet<SchemaId>) -> Result<()> {
        let target = self.doc.canonical(id)?;
        if !visiting.insert(target) {
            return Ok(());
        }
        let node = self.doc.schema(target);
        for &branch in &node.all_of {
            self.flatten_into(branch, out, visiting)?;
        }
        if !node.is_bare_all_of() {
            out.push(target);
        }
        Ok(())
    }

    /// The node without `allOf`, child links made canonical
    fn local_view(&self, id: SchemaId) -> Result<SchemaNode> {
        let mut node = self.doc.schema(id).clone();
        node.all_of.clear();
        for child in node.properties.values_mut() {
            *child = self.doc.canonical(*child)?;
        }
        if let Some(items) = node.items {
            node.items = Some(self.doc.canonical(items)?);
        }
        if let Some(AdditionalProperties::Schema(s)) = node.additional_properties {
            node.additional_properties = Some(AdditionalProperties::Schema(self.doc.canonical(s)?));
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{load_from_value, ComponentKey, DiagnosticCode, Severity};
    use serde_json::json;

    fn doc(schemas: serde_json::Value) -> Document {
        load_from_value(&json!({ "components": { "schemas": schemas } })).unwrap()
    }

    fn resolve(d: &Document, name: &str) -> Result<(ResolvedSchema, Vec<DiagnosticItem>)> {
        CompositionResolver::new(d, false).resolve_node(d.components.schemas[name])
    }

    fn string_node() -> SchemaNode {
        SchemaNode {
            json_type: Some(JsonType::String),
            ..Default::default()
        }
    }

    #[test]
    fn test_nested_all_of_is_transparent() {
        let d = doc(json!({
            "Base": { "type": "object", "required": ["id"], "properties": { "id": { "type": "string" } } },
            "Named": { "allOf": [
                { "$ref": "#/components/schemas/Base" },
                { "properties": { "name": { "type": "string" } } }
            ]},
            "Pet": { "allOf": [
                { "$ref": "#/components/schemas/Named" },
                { "required": ["name"], "properties": { "age": { "type": "integer", "minimum": 0 } } }
            ]}
        }));
        let (pet, items) = resolve(&d, "Pet").unwrap();
        assert!(items.is_empty());
        match pet.shape {
            ResolvedShape::Record { properties, .. } => {
                assert_eq!(properties.keys().collect::<Vec<_>>(), vec!["id", "name", "age"]);
                assert!(properties["id"].required);
                assert!(properties["name"].required);
                assert!(!properties["age"].required);
            }
            other => panic!("Expected Record, got {:?}", other),
        }
    }

    #[test]
    fn test_nullable_disagreement_is_conflict() {
        let d = doc(json!({
            "A": { "type": "object", "nullable": true, "properties": { "a": { "type": "string" } } },
            "B": { "type": "object", "properties": { "b": { "type": "string" } } },
            "AB": { "allOf": [
                { "$ref": "#/components/schemas/A" },
                { "$ref": "#/components/schemas/B" }
            ]}
        }));
        match resolve(&d, "AB") {
            Err(TypeModelError::StructuralConflict { location, conflict }) => {
                assert_eq!(location, ComponentKey::schema("AB").to_string());
                assert_eq!(conflict, ConflictError::ConflictingFlag("nullable"));
            }
            other => panic!("Expected StructuralConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_conflict_names_its_pointer() {
        let d = doc(json!({
            "Widget": {
                "type": "object",
                "properties": {
                    "size": { "allOf": [
                        { "type": "integer", "nullable": true },
                        { "type": "integer" }
                    ]}
                }
            }
        }));
        let resolver = CompositionResolver::new(&d, false);
        let size = d.schema(d.components.schemas["Widget"]).properties["size"];
        match resolver.resolve_node(size) {
            Err(TypeModelError::StructuralConflict { location, conflict }) => {
                assert_eq!(location, "#/components/schemas/Widget/properties/size");
                assert_eq!(conflict, ConflictError::ConflictingFlag("nullable"));
            }
            other => panic!("Expected StructuralConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_incompatible_types() {
        let d = doc(json!({
            "X": { "allOf": [{ "type": "string" }, { "type": "object" }] }
        }));
        assert!(matches!(
            resolve(&d, "X"),
            Err(TypeModelError::StructuralConflict {
                conflict: ConflictError::IncompatibleTypes { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_defaults_and_bounds() {
        let d = doc(json!({
            "Ok": { "allOf": [
                { "type": "integer", "minimum": 1, "maximum": 100, "default": 5 },
                { "minimum": 10, "maximum": 50 }
            ]},
            "Clash": { "allOf": [
                { "type": "integer", "default": 1 },
                { "type": "integer", "default": 2 }
            ]}
        }));
        let (ok, _) = resolve(&d, "Ok").unwrap();
        assert_eq!(ok.constraints.bounds.minimum, Some(10.0));
        assert_eq!(ok.constraints.bounds.maximum, Some(50.0));
        assert_eq!(ok.default, Some(json!(5)));

        match resolve(&d, "Clash") {
            Err(TypeModelError::StructuralConflict { conflict, .. }) => assert_eq!(
                conflict,
                ConflictError::ConflictingDefaults { left: json!(1), right: json!(2) }
            ),
            other => panic!("Expected ConflictingDefaults, got {:?}", other),
        }
    }

    #[test]
    fn test_additional_properties_rules() {
        let d = doc(json!({
            "Closed": { "allOf": [
                { "type": "object", "properties": { "a": { "type": "string" } } },
                { "additionalProperties": false },
                { "additionalProperties": { "type": "string" } }
            ]},
            "Clash": { "allOf": [
                { "type": "object", "properties": { "a": { "type": "string" } },
                  "additionalProperties": { "type": "string" } },
                { "additionalProperties": { "type": "integer" } }
            ]}
        }));
        match resolve(&d, "Closed").unwrap().0.shape {
            ResolvedShape::Record { additional, .. } => {
                assert_eq!(additional, Some(AdditionalProperties::Allowed(false)));
            }
            other => panic!("Expected Record, got {:?}", other),
        }
        assert!(matches!(
            resolve(&d, "Clash"),
            Err(TypeModelError::StructuralConflict {
                conflict: ConflictError::ConflictingAdditionalProperties,
                ..
            })
        ));
    }

    #[test]
    fn test_property_override_diagnostic_and_strict() {
        let d = doc(json!({
            "Over": { "allOf": [
                { "type": "object", "properties": { "id": { "type": "string" } } },
                { "properties": { "id": { "type": "integer" } } }
            ]}
        }));
        let (over, items) = resolve(&d, "Over").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].code, DiagnosticCode::PropertyOverride);
        assert_eq!(items[0].severity, Severity::Warning);
        match over.shape {
            ResolvedShape::Record { properties, .. } => {
                let id = d.schema(properties["id"].schema);
                assert_eq!(id.json_type, Some(JsonType::Integer));
            }
            other => panic!("Expected Record, got {:?}", other),
        }

        let strict = CompositionResolver::new(&d, true)
            .resolve_node(d.components.schemas["Over"])
            .unwrap();
        assert_eq!(strict.1[0].severity, Severity::Error);
    }

    #[test]
    fn test_same_reference_twice_is_not_an_override() {
        let d = doc(json!({
            "Id": { "type": "string" },
            "Twice": { "allOf": [
                { "type": "object", "properties": { "id": { "$ref": "#/components/schemas/Id" } } },
                { "properties": { "id": { "$ref": "#/components/schemas/Id" } } }
            ]}
        }));
        let (_, items) = resolve(&d, "Twice").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_merge_grouping_order_insensitive() {
        let a = SchemaNode {
            bounds: Bounds { min_length: Some(2), ..Default::default() },
            enum_values: vec![json!("x")],
            ..string_node()
        };
        let b = SchemaNode {
            bounds: Bounds { max_length: Some(8), min_length: Some(3), ..Default::default() },
            enum_values: vec![json!("y")],
            default: Some(json!("x")),
            ..SchemaNode::default()
        };
        let c = SchemaNode {
            bounds: Bounds { max_length: Some(5), ..Default::default() },
            enum_values: vec![json!("x"), json!("z")],
            ..string_node()
        };

        let left = merge_nodes(&[merge_nodes(&[a.clone(), b.clone()]).unwrap().node, c.clone()]).unwrap();
        let right = merge_nodes(&[a.clone(), merge_nodes(&[b.clone(), c.clone()]).unwrap().node]).unwrap();
        let flat = merge_nodes(&[a, b, c]).unwrap();
        assert_eq!(left.node, right.node);
        assert_eq!(left.node, flat.node);
        assert_eq!(flat.node.bounds.min_length, Some(3));
        assert_eq!(flat.node.bounds.max_length, Some(5));
        assert_eq!(flat.node.enum_values, vec![json!("x"), json!("y"), json!("z")]);
    }

    #[test]
    fn test_format_conflict() {
        let a = SchemaNode { format: Some("email".into()), ..string_node() };
        let b = SchemaNode { format: Some("uri".into()), ..string_node() };
        assert_eq!(
            merge_nodes(&[a, b]).unwrap_err(),
            ConflictError::ConflictingFlag("format")
        );
    }

    #[test]
    fn test_single_reference_all_of_is_alias() {
        let d = doc(json!({
            "Pet": { "type": "object", "properties": { "name": { "type": "string" } } },
            "Animal": { "title": "Animal", "allOf": [{ "$ref": "#/components/schemas/Pet" }] }
        }));
        let (animal, _) = resolve(&d, "Animal").unwrap();
        assert_eq!(
            animal.shape,
            ResolvedShape::Alias { target: d.components.schemas["Pet"] }
        );
    }

    #[test]
    fn test_cyclic_all_of_terminates() {
        let d = doc(json!({
            "A": { "allOf": [
                { "$ref": "#/components/schemas/B" },
                { "type": "object", "properties": { "a": { "type": "string" } } }
            ]},
            "B": { "allOf": [{ "$ref": "#/components/schemas/A" }] }
        }));
        let (a, _) = resolve(&d, "A").unwrap();
        assert!(matches!(a.shape, ResolvedShape::Record { .. }));
    }

    #[test]
    fn test_resolve_walks_recursive_schemas_once() {
        let d = doc(json!({
            "Node": { "type": "object", "properties": {
                "value": { "type": "string" },
                "children": { "type": "array", "items": { "$ref": "#/components/schemas/Node" } }
            }}
        }));
        let root = SchemaRoot {
            schema: d.components.schemas["Node"],
            origin: crate::graph::SchemaOrigin::Component("Node".into()),
        };
        let (model, diagnostics) = CompositionResolver::new(&d, false).resolve(&[root]).unwrap();
        // Node, value, children
        assert_eq!(model.len(), 3);
        assert!(diagnostics.is_empty());
        assert_eq!(model.iter().next().map(|r| r.source), Some(d.components.schemas["Node"]));
    }

    #[test]
    fn test_missing_reference_in_branch() {
        let d = doc(json!({
            "X": { "allOf": [{ "$ref": "#/components/schemas/Nope" }, { "type": "object" }] }
        }));
        assert!(matches!(
            resolve(&d, "X"),
            Err(TypeModelError::UnresolvableReference { .. })
        ));
    }
}
