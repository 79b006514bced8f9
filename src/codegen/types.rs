//! Type Descriptors
//!
//! The emitter-facing view of the model. Types reference each other by name
//! only, so the descriptor set is a forest even when the schema graph has
//! cycles.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::names::{is_keyword, NameSource, TypeNameRegistry};
use super::validate::Procedure;
use crate::graph::{
    AdditionalProperties, JsonType, ResolvedModel, ResolvedShape, SchemaId, UnionMode,
    UnionStrategy,
};

// =============================================================================
// Field Types
// =============================================================================

/// Language-agnostic field type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    /// Another generated type
    Named { name: String },
    Scalar {
        json_type: JsonType,
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Array { items: Box<FieldType> },
    /// String-keyed map
    Map { values: Box<FieldType> },
    /// Unknown/any type
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    /// Original JSON name
    pub json_name: String,
    /// snake_case, escaped if keyword
    pub field_name: String,
    pub required: bool,
    pub nullable: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantDef {
    /// Target type name, or `Variant{n}` for anonymous branches
    pub label: String,
    pub field_type: FieldType,
}

/// How a union picks its variant, with branches spelled as type names
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dispatch {
    ByKind,
    ByDiscriminator {
        property: String,
        mapping: Vec<(String, String)>,
    },
    Trial,
}

// =============================================================================
// Type Kind
// =============================================================================

/// What kind of type to generate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    /// Record with named fields
    Struct {
        fields: Vec<FieldDef>,
        /// Typed extra entries
        #[serde(skip_serializing_if = "Option::is_none")]
        additional: Option<FieldType>,
        /// Unknown keys are rejected
        closed: bool,
    },
    /// Enumeration of scalar literals
    Enum {
        json_type: JsonType,
        values: Vec<serde_json::Value>,
    },
    Union {
        mode: UnionMode,
        dispatch: Dispatch,
        variants: Vec<VariantDef>,
    },
    /// Wrapper around a scalar, array, map or single union branch
    Newtype { inner: FieldType },
    /// Another name for an existing type
    Alias { target: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub node: SchemaId,
    pub source: NameSource,
    pub kind: TypeKind,
    pub nullable: bool,
    /// Static capability: whether `validation` can ever fail
    pub needs_validation: bool,
    pub validation: Procedure,
}

// =============================================================================
// Lowering
// =============================================================================

/// Turns resolved nodes into descriptors
pub struct DescriptorBuilder<'m> {
    resolved: &'m ResolvedModel,
    names: &'m TypeNameRegistry,
}

impl<'m> DescriptorBuilder<'m> {
    pub fn new(resolved: &'m ResolvedModel, names: &'m TypeNameRegistry) -> Self {
        Self { resolved, names }
    }

    pub fn kind(&self, node: SchemaId) -> TypeKind {
        let Some(schema) = self.resolved.get(node) else {
            return TypeKind::Newtype { inner: FieldType::Any };
        };

        match &schema.shape {
            ResolvedShape::Record {
                properties,
                additional,
            } => {
                let fields = properties
                    .iter()
                    .map(|(json_name, p)| {
                        let field = self.resolved.get(p.schema);
                        FieldDef {
                            json_name: json_name.clone(),
                            field_name: to_snake_case(json_name),
                            required: p.required,
                            nullable: field.is_some_and(|f| f.is_nullable()),
                            read_only: field.is_some_and(|f| f.flags.read_only),
                            write_only: field.is_some_and(|f| f.flags.write_only),
                            field_type: self.field_type(p.schema),
                            default: field.and_then(|f| f.default.clone()),
                        }
                    })
                    .collect();
                TypeKind::Struct {
                    fields: disambiguate_field_names(fields),
                    additional: match additional {
                        Some(AdditionalProperties::Schema(id)) => Some(self.field_type(*id)),
                        _ => None,
                    },
                    closed: matches!(additional, Some(AdditionalProperties::Allowed(false))),
                }
            }
            ResolvedShape::Scalar { json_type } if schema.is_enum() => TypeKind::Enum {
                json_type: *json_type,
                values: schema.constraints.enum_values.clone(),
            },
            ResolvedShape::Union(u) if u.branches.len() > 1 => TypeKind::Union {
                mode: u.mode,
                dispatch: match &u.strategy {
                    UnionStrategy::ByDiscriminator { property, mapping } => Dispatch::ByDiscriminator {
                        property: property.clone(),
                        mapping: mapping
                            .iter()
                            .map(|(tag, id)| (tag.clone(), self.label(*id, None)))
                            .collect(),
                    },
                    UnionStrategy::ByKind => Dispatch::ByKind,
                    UnionStrategy::Single | UnionStrategy::Trial => Dispatch::Trial,
                },
                variants: u
                    .branches
                    .iter()
                    .enumerate()
                    .map(|(i, &b)| VariantDef {
                        label: self.label(b, Some(i)),
                        field_type: self.field_type(b),
                    })
                    .collect(),
            },
            ResolvedShape::Alias { target } => match self.field_type(*target) {
                FieldType::Named { name } => TypeKind::Alias { target: name },
                inner => TypeKind::Newtype { inner },
            },
            _ => TypeKind::Newtype {
                inner: self.structure(node, &mut HashSet::new()),
            },
        }
    }

    /// How a field of this node's type is spelled
    pub fn field_type(&self, node: SchemaId) -> FieldType {
        if let Some(name) = self.names.name_of(node) {
            return FieldType::Named {
                name: name.to_string(),
            };
        }
        self.structure(node, &mut HashSet::new())
    }

    /// Structural spelling, ignoring the node's own name
    fn structure(&self, node: SchemaId, seen: &mut HashSet<SchemaId>) -> FieldType {
        let Some(schema) = self.resolved.get(node) else {
            return FieldType::Any;
        };
        if !seen.insert(node) {
            return FieldType::Any;
        }
        let child = |id: &Option<SchemaId>, seen: &mut HashSet<SchemaId>| -> Box<FieldType> {
            Box::new(match id {
                Some(id) => match self.names.name_of(*id) {
                    Some(name) => FieldType::Named {
                        name: name.to_string(),
                    },
                    None => self.structure(*id, seen),
                },
                None => FieldType::Any,
            })
        };

        match &schema.shape {
            ResolvedShape::Scalar { json_type } => FieldType::Scalar {
                json_type: *json_type,
                format: schema.constraints.format.clone(),
            },
            ResolvedShape::Array { items } => FieldType::Array {
                items: child(items, seen),
            },
            ResolvedShape::Map { values } => FieldType::Map {
                values: child(values, seen),
            },
            ResolvedShape::Alias { target } => *child(&Some(*target), seen),
            ResolvedShape::Union(u) if u.branches.len() == 1 => *child(&Some(u.branches[0]), seen),
            // Records and real unions are always named
            ResolvedShape::Record { .. } | ResolvedShape::Union(_) | ResolvedShape::Any => FieldType::Any,
        }
    }

    fn label(&self, node: SchemaId, index: Option<usize>) -> String {
        match (self.names.name_of(node), index) {
            (Some(name), _) => name.to_string(),
            (None, Some(i)) => format!("Variant{}", i),
            (None, None) => node.to_string(),
        }
    }
}

/// Suffix repeated field names within one struct: `pet_id`, `pet_id0`, `pet_id1`
fn disambiguate_field_names(mut fields: Vec<FieldDef>) -> Vec<FieldDef> {
    let mut taken = HashSet::new();
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for field in &mut fields {
        let base = std::mem::take(&mut field.field_name);
        let counter = occurrences.entry(base.clone()).or_insert(0);
        loop {
            let candidate = match counter.checked_sub(1) {
                None => base.clone(),
                Some(n) => format!("{}{}", base, n),
            };
            *counter += 1;
            if taken.insert(candidate.clone()) {
                field.field_name = candidate;
                break;
            }
        }
    }
    fields
}

/// Convert a JSON property name to a snake_case field name
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
            prev_lower = false;
        }
    }

    let trimmed = result.trim_end_matches('_');
    let mut result = if trimmed.is_empty() {
        "field".to_string()
    } else {
        trimmed.to_string()
    };
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    if is_keyword(&result) {
        result.push('_');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::TypeModel;
    use crate::config::TypeModelConfig;
    use crate::graph::load_from_value;
    use serde_json::json;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("petId"), "pet_id");
        assert_eq!(to_snake_case("created-at"), "created_at");
        assert_eq!(to_snake_case("@type"), "type_");
        assert_eq!(to_snake_case("type"), "type_");
        assert_eq!(to_snake_case("2fa"), "_2fa");
        assert_eq!(to_snake_case("x.y"), "x_y");
        assert_eq!(to_snake_case("$"), "field");
    }

    #[test]
    fn test_field_names_unique_within_struct() {
        let doc = load_from_value(&json!({
            "components": { "schemas": {
                "P": {
                    "type": "object",
                    "properties": {
                        "petId": { "type": "string" },
                        "pet_id": { "type": "integer" },
                        "pet-id": { "type": "boolean" },
                        "pet_id0": { "type": "string" }
                    }
                }
            }}
        }))
        .unwrap();
        let mut config = TypeModelConfig::default();
        config.pruning.enabled = false;
        let model = TypeModel::build(doc, &config).unwrap();

        let TypeKind::Struct { fields, .. } = &model.get("P").unwrap().kind else {
            panic!("P should be a struct");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field_name.as_str()).collect();
        assert_eq!(names, vec!["pet_id", "pet_id0", "pet_id1", "pet_id00"]);
        assert_eq!(fields[1].json_name, "pet_id");
    }
}
