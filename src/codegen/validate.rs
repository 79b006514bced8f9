//! Validation Synthesis
//!
//! Derives, per generated type, a description of the checks a value of that
//! type must pass. Nothing here evaluates a value; the output is a plan for
//! an emitter.
//!
//! Precedence for a type that needs validation:
//! 1. alias / single-branch wrapper → delegate to the target's procedure
//! 2. record with only tag-expressible checks and no union descendants →
//!    one whole-structure check
//! 3. array → nil policy, count rules, per-index element checks
//! 4. map → nil policy, count rules, per-entry value checks
//! 5. anything else → per-field checks, failures accumulated

use std::collections::{BTreeSet, HashSet};

use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;

use super::config::ValidationConfig;
use super::names::TypeNameRegistry;
use crate::graph::{
    AdditionalProperties, DiagnosticCode, DiagnosticItem, Diagnostics, JsonType, ResolvedModel,
    ResolvedSchema, ResolvedShape, SchemaId,
};

// =============================================================================
// Rules
// =============================================================================

/// One constraint check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    Enum { values: Vec<serde_json::Value> },
    MinLength { limit: u64 },
    MaxLength { limit: u64 },
    /// `compiles` is `None` when pattern checking is switched off
    Pattern { pattern: String, compiles: Option<bool> },
    Format { format: String },
    Minimum { value: f64, exclusive: bool },
    Maximum { value: f64, exclusive: bool },
    MultipleOf { value: f64 },
    MinItems { limit: u64 },
    MaxItems { limit: u64 },
    UniqueItems,
    MinProperties { limit: u64 },
    MaxProperties { limit: u64 },
}

impl Check {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Enum { .. } => ErrorKind::NotInEnum,
            Self::MinLength { .. } => ErrorKind::TooShort,
            Self::MaxLength { .. } => ErrorKind::TooLong,
            Self::Pattern { .. } => ErrorKind::PatternMismatch,
            Self::Format { .. } => ErrorKind::InvalidFormat,
            Self::Minimum { .. } => ErrorKind::BelowMinimum,
            Self::Maximum { .. } => ErrorKind::AboveMaximum,
            Self::MultipleOf { .. } => ErrorKind::NotMultipleOf,
            Self::MinItems { .. } => ErrorKind::TooFewItems,
            Self::MaxItems { .. } => ErrorKind::TooManyItems,
            Self::UniqueItems => ErrorKind::DuplicateItems,
            Self::MinProperties { .. } => ErrorKind::TooFewProperties,
            Self::MaxProperties { .. } => ErrorKind::TooManyProperties,
        }
    }

    /// Failure message for an observed count
    pub fn count_message(&self, observed: u64) -> Option<String> {
        let msg = match self {
            Self::MinItems { limit } => format!("must have at least {} items, got {}", limit, observed),
            Self::MaxItems { limit } => format!("must have at most {} items, got {}", limit, observed),
            Self::MinProperties { limit } => {
                format!("must have at least {} entries, got {}", limit, observed)
            }
            Self::MaxProperties { limit } => {
                format!("must have at most {} entries, got {}", limit, observed)
            }
            _ => return None,
        };
        Some(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotInEnum,
    TooShort,
    TooLong,
    PatternMismatch,
    InvalidFormat,
    BelowMinimum,
    AboveMaximum,
    NotMultipleOf,
    TooFewItems,
    TooManyItems,
    DuplicateItems,
    TooFewProperties,
    TooManyProperties,
}

/// What happens after a rule fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop checking this value
    FailFast,
    /// Record the failure and keep going
    Accumulate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRule {
    #[serde(flatten)]
    pub check: Check,
    pub error: ErrorKind,
    pub mode: FailureMode,
}

impl ValidationRule {
    pub fn new(check: Check) -> Self {
        // A value outside its enum makes every later rule meaningless
        let mode = match check {
            Check::Enum { .. } => FailureMode::FailFast,
            _ => FailureMode::Accumulate,
        };
        Self {
            error: check.error_kind(),
            check,
            mode,
        }
    }
}

// =============================================================================
// Procedures
// =============================================================================

/// Handling of a missing / null value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum NilPolicy {
    Accept,
    /// Fails as if an empty collection had been supplied
    Reject { rule: ValidationRule, observed: u64 },
}

/// Where a nested check goes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Target {
    /// The named type's own procedure
    Named { name: String },
    /// An anonymous node's procedure, spelled out in place
    Inline { procedure: Box<Procedure> },
}

/// Underlying value kind a delegate dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    Any,
    Scalar(JsonType),
    Array,
    Map,
    Record,
    Union,
}

/// Tag-expressible rules on one record field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRules {
    pub field: String,
    pub required: bool,
    pub rules: Vec<ValidationRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldCheck {
    /// Constrained scalar, checked through its rule tags
    Tagged(FieldRules),
    /// Recursive check, skipped when `nil_guard` is set and the field is nil
    Nested {
        field: String,
        nil_guard: bool,
        target: Target,
    },
}

/// The check plan of one type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Procedure {
    /// Success sentinel
    AlwaysValid,
    /// `nil` is the target's own nil policy, seen through the alias
    Delegate {
        target: Target,
        representation: Representation,
        nil: NilPolicy,
    },
    /// One generic check over the whole record
    WholeStructure {
        rules: Vec<ValidationRule>,
        fields: Vec<FieldRules>,
    },
    /// Element failures are reported as `[index]`
    Array {
        nil: NilPolicy,
        rules: Vec<ValidationRule>,
        elements: Option<Target>,
    },
    /// Entry failures are reported as `[key]`
    Map {
        nil: NilPolicy,
        rules: Vec<ValidationRule>,
        values: Option<Target>,
    },
    /// Field checks in declaration order, all failures accumulated
    Fields {
        rules: Vec<ValidationRule>,
        checks: Vec<FieldCheck>,
        additional: Option<Target>,
    },
    Scalar { rules: Vec<ValidationRule> },
    /// Checks the active variant only
    Variants { variants: Vec<Target> },
}

impl Procedure {
    pub fn is_always_valid(&self) -> bool {
        matches!(self, Self::AlwaysValid)
    }

    /// Outcome for a nil input, known without evaluating anything
    pub fn nil_outcome(&self) -> ValidationOutcome {
        match self {
            Self::Array { nil, .. } | Self::Map { nil, .. } | Self::Delegate { nil, .. } => match nil {
                NilPolicy::Accept => ValidationOutcome::Success,
                NilPolicy::Reject { rule, observed } => {
                    let message = rule
                        .check
                        .count_message(*observed)
                        .unwrap_or_else(|| "value is required".to_string());
                    ValidationOutcome::Failure(vec![ValidationFailure {
                        path: String::new(),
                        message,
                    }])
                }
            },
            _ => ValidationOutcome::Success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    /// Field path, empty for the value itself
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "failures", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Success,
    Failure(Vec<ValidationFailure>),
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

// =============================================================================
// Synthesizer
// =============================================================================

pub struct ValidationSynthesizer<'m> {
    resolved: &'m ResolvedModel,
    names: &'m TypeNameRegistry,
    config: &'m ValidationConfig,
    needs: BTreeSet<SchemaId>,
    union_reach: BTreeSet<SchemaId>,
}

impl<'m> ValidationSynthesizer<'m> {
    /// Computes the capability flags up front
    pub fn new(resolved: &'m ResolvedModel, names: &'m TypeNameRegistry, config: &'m ValidationConfig) -> Self {
        let mut synth = Self {
            resolved,
            names,
            config,
            needs: BTreeSet::new(),
            union_reach: BTreeSet::new(),
        };
        synth.needs = synth.fixed_point(|s, schema| !s.rules(schema).is_empty());
        synth.union_reach = synth.fixed_point(|_, schema| match &schema.shape {
            ResolvedShape::Union(u) => u.branches.len() > 1,
            _ => false,
        });
        synth
    }

    /// Nodes that satisfy `seed` or reach one that does.
    ///
    /// Iterates until nothing changes, so cycles settle.
    fn fixed_point(&self, seed: impl Fn(&Self, &ResolvedSchema) -> bool) -> BTreeSet<SchemaId> {
        let mut set: BTreeSet<SchemaId> = self
            .resolved
            .iter()
            .filter(|s| seed(self, s))
            .map(|s| s.source)
            .collect();

        loop {
            let before = set.len();
            for schema in self.resolved.iter() {
                if !set.contains(&schema.source)
                    && schema.shape.children().iter().any(|c| set.contains(c))
                {
                    set.insert(schema.source);
                }
            }
            if set.len() == before {
                return set;
            }
        }
    }

    pub fn needs_validation(&self, node: SchemaId) -> bool {
        self.needs.contains(&node)
    }

    /// Procedure of every named type, registry order
    pub fn synthesize_all(&self) -> Vec<(String, Procedure)> {
        let identities: Vec<_> = self.names.iter().collect();
        identities
            .par_iter()
            .map(|t| (t.name.clone(), self.synthesize(t.node)))
            .collect()
    }

    /// Procedure of a named type
    pub fn synthesize(&self, node: SchemaId) -> Procedure {
        let mut stack = HashSet::new();
        self.procedure(node, true, &mut stack)
    }

    /// Non-compiling patterns, discovery order
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        if !self.config.check_patterns {
            return diagnostics;
        }
        for schema in self.resolved.iter() {
            if let Some(pattern) = &schema.constraints.pattern {
                if let Err(e) = Regex::new(pattern) {
                    let location = self
                        .names
                        .name_of(schema.source)
                        .map(str::to_string)
                        .unwrap_or_else(|| schema.source.to_string());
                    diagnostics.push(
                        DiagnosticItem::new(
                            location,
                            DiagnosticCode::InvalidPattern,
                            format!("pattern '{}' does not compile", pattern),
                        )
                        .with_context(e.to_string()),
                    );
                }
            }
        }
        diagnostics
    }

    /// `present` is true when nil must be rejected by count rules
    fn procedure(&self, node: SchemaId, present: bool, stack: &mut HashSet<SchemaId>) -> Procedure {
        let Some(schema) = self.resolved.get(node) else {
            return Procedure::AlwaysValid;
        };
        if !self.needs_validation(node) || !stack.insert(node) {
            return Procedure::AlwaysValid;
        }
        let present = present && !schema.is_nullable();

        let procedure = match &schema.shape {
            ResolvedShape::Alias { target } => self.delegate(*target, present, stack),
            ResolvedShape::Union(u) if u.branches.len() == 1 => self.delegate(u.branches[0], present, stack),
            ResolvedShape::Record { properties, .. } if self.is_optimizable(schema) => {
                Procedure::WholeStructure {
                    rules: self.rules(schema),
                    fields: properties
                        .iter()
                        .filter_map(|(name, p)| {
                            let rules = self.resolved.get(p.schema).map(|s| self.rules(s))?;
                            (!rules.is_empty()).then(|| FieldRules {
                                field: name.clone(),
                                required: p.required,
                                rules,
                            })
                        })
                        .collect(),
                }
            }
            ResolvedShape::Array { items } => Procedure::Array {
                nil: self.nil_policy(schema, present, |c| matches!(c, Check::MinItems { .. })),
                rules: self.rules(schema),
                elements: items.and_then(|i| self.target(i, true, stack)),
            },
            ResolvedShape::Map { values } => Procedure::Map {
                nil: self.nil_policy(schema, present, |c| matches!(c, Check::MinProperties { .. })),
                rules: self.rules(schema),
                values: values.and_then(|v| self.target(v, true, stack)),
            },
            ResolvedShape::Record { properties, additional } => {
                let checks = properties
                    .iter()
                    .filter_map(|(name, p)| self.field_check(name, p.schema, p.required, stack))
                    .collect();
                let additional = match additional {
                    Some(AdditionalProperties::Schema(id)) => self.target(*id, true, stack),
                    _ => None,
                };
                Procedure::Fields {
                    rules: self.rules(schema),
                    checks,
                    additional,
                }
            }
            ResolvedShape::Union(u) => Procedure::Variants {
                variants: u
                    .branches
                    .iter()
                    .map(|&b| {
                        self.target(b, true, stack).unwrap_or(Target::Inline {
                            procedure: Box::new(Procedure::AlwaysValid),
                        })
                    })
                    .collect(),
            },
            ResolvedShape::Scalar { .. } | ResolvedShape::Any => Procedure::Scalar {
                rules: self.rules(schema),
            },
        };

        stack.remove(&node);
        procedure
    }

    fn delegate(&self, target: SchemaId, present: bool, stack: &mut HashSet<SchemaId>) -> Procedure {
        let representation = self.representation(target);
        let nil = self.delegated_nil_policy(target, present);
        match self.target(target, present, stack) {
            Some(target) => Procedure::Delegate {
                target,
                representation,
                nil,
            },
            None => Procedure::AlwaysValid,
        }
    }

    /// Nil policy of the collection at the end of an alias chain
    fn delegated_nil_policy(&self, node: SchemaId, present: bool) -> NilPolicy {
        let mut seen = HashSet::new();
        let mut current = node;
        let mut present = present;
        while seen.insert(current) {
            let Some(schema) = self.resolved.get(current) else {
                break;
            };
            present = present && !schema.is_nullable();
            match &schema.shape {
                ResolvedShape::Alias { target } => current = *target,
                ResolvedShape::Union(u) if u.branches.len() == 1 => current = u.branches[0],
                ResolvedShape::Array { .. } => {
                    return self.nil_policy(schema, present, |c| matches!(c, Check::MinItems { .. }))
                }
                ResolvedShape::Map { .. } => {
                    return self.nil_policy(schema, present, |c| matches!(c, Check::MinProperties { .. }))
                }
                _ => break,
            }
        }
        NilPolicy::Accept
    }

    /// Check for a nested node; `None` when it needs none
    fn target(&self, node: SchemaId, present: bool, stack: &mut HashSet<SchemaId>) -> Option<Target> {
        if !self.needs_validation(node) {
            return None;
        }
        if let Some(name) = self.names.name_of(node) {
            return Some(Target::Named { name: name.to_string() });
        }
        Some(Target::Inline {
            procedure: Box::new(self.procedure(node, present, stack)),
        })
    }

    fn field_check(
        &self,
        field: &str,
        node: SchemaId,
        required: bool,
        stack: &mut HashSet<SchemaId>,
    ) -> Option<FieldCheck> {
        let schema = self.resolved.get(node)?;
        if !self.needs_validation(node) {
            return None;
        }
        if self.is_tag_expressible(node) {
            return Some(FieldCheck::Tagged(FieldRules {
                field: field.to_string(),
                required,
                rules: self.rules(schema),
            }));
        }
        let target = self.target(node, required, stack)?;
        Some(FieldCheck::Nested {
            field: field.to_string(),
            nil_guard: !required || schema.is_nullable(),
            target,
        })
    }

    /// Unnamed scalar whose checks fit in rule tags
    fn is_tag_expressible(&self, node: SchemaId) -> bool {
        self.names.name_of(node).is_none()
            && self
                .resolved
                .get(node)
                .is_some_and(|s| matches!(s.shape, ResolvedShape::Scalar { .. } | ResolvedShape::Any))
    }

    fn is_optimizable(&self, schema: &ResolvedSchema) -> bool {
        let ResolvedShape::Record { properties, additional } = &schema.shape else {
            return false;
        };
        if self.union_reach.contains(&schema.source) {
            return false;
        }
        if let Some(AdditionalProperties::Schema(id)) = additional {
            if self.needs_validation(*id) {
                return false;
            }
        }
        properties
            .values()
            .all(|p| !self.needs_validation(p.schema) || self.is_tag_expressible(p.schema))
    }

    fn nil_policy(&self, schema: &ResolvedSchema, present: bool, is_min: impl Fn(&Check) -> bool) -> NilPolicy {
        if !present {
            return NilPolicy::Accept;
        }
        let Some(rule) = self.rules(schema).into_iter().find(|r| is_min(&r.check)) else {
            return NilPolicy::Accept;
        };
        let limit = match rule.check {
            Check::MinItems { limit } | Check::MinProperties { limit } => limit,
            _ => 0,
        };
        if limit == 0 {
            return NilPolicy::Accept;
        }
        NilPolicy::Reject {
            rule: ValidationRule {
                mode: FailureMode::FailFast,
                ..rule
            },
            observed: 0,
        }
    }

    fn representation(&self, node: SchemaId) -> Representation {
        let mut seen = HashSet::new();
        let mut current = node;
        while seen.insert(current) {
            let Some(schema) = self.resolved.get(current) else {
                break;
            };
            match &schema.shape {
                ResolvedShape::Alias { target } => current = *target,
                ResolvedShape::Union(u) if u.branches.len() == 1 => current = u.branches[0],
                ResolvedShape::Any => return Representation::Any,
                ResolvedShape::Scalar { json_type } => return Representation::Scalar(*json_type),
                ResolvedShape::Array { .. } => return Representation::Array,
                ResolvedShape::Map { .. } => return Representation::Map,
                ResolvedShape::Record { .. } => return Representation::Record,
                ResolvedShape::Union(_) => return Representation::Union,
            }
        }
        Representation::Any
    }

    /// Local rules of a node, fixed order
    fn rules(&self, schema: &ResolvedSchema) -> Vec<ValidationRule> {
        let c = &schema.constraints;
        let b = &c.bounds;
        let (strings, numbers, arrays, objects) = match &schema.shape {
            ResolvedShape::Scalar { json_type } => (
                *json_type == JsonType::String,
                matches!(json_type, JsonType::Integer | JsonType::Number),
                false,
                false,
            ),
            ResolvedShape::Any => (true, true, false, false),
            ResolvedShape::Array { .. } => (false, false, true, false),
            ResolvedShape::Map { .. } | ResolvedShape::Record { .. } => (false, false, false, true),
            ResolvedShape::Union(_) | ResolvedShape::Alias { .. } => (false, false, false, false),
        };

        let mut checks = Vec::new();
        if !c.enum_values.is_empty() && matches!(schema.shape, ResolvedShape::Scalar { .. } | ResolvedShape::Any) {
            checks.push(Check::Enum {
                values: c.enum_values.clone(),
            });
        }
        if strings {
            checks.extend(b.min_length.map(|limit| Check::MinLength { limit }));
            checks.extend(b.max_length.map(|limit| Check::MaxLength { limit }));
            if let Some(pattern) = &c.pattern {
                checks.push(Check::Pattern {
                    pattern: pattern.clone(),
                    compiles: self.config.check_patterns.then(|| Regex::new(pattern).is_ok()),
                });
            }
            if let Some(format) = &c.format {
                if self.config.checked_formats.iter().any(|f| f == format) {
                    checks.push(Check::Format { format: format.clone() });
                }
            }
        }
        if numbers {
            checks.extend(b.minimum.map(|value| Check::Minimum {
                value,
                exclusive: schema.flags.exclusive_minimum,
            }));
            checks.extend(b.maximum.map(|value| Check::Maximum {
                value,
                exclusive: schema.flags.exclusive_maximum,
            }));
            checks.extend(b.multiple_of.map(|value| Check::MultipleOf { value }));
        }
        if arrays {
            checks.extend(b.min_items.map(|limit| Check::MinItems { limit }));
            checks.extend(b.max_items.map(|limit| Check::MaxItems { limit }));
            if schema.flags.unique_items {
                checks.push(Check::UniqueItems);
            }
        }
        if objects {
            checks.extend(b.min_properties.map(|limit| Check::MinProperties { limit }));
            checks.extend(b.max_properties.map(|limit| Check::MaxProperties { limit }));
        }

        checks.into_iter().map(ValidationRule::new).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::config::NamingConfig;
    use crate::graph::{load_from_value, CompositionResolver, Document};
    use serde_json::json;

    struct Built {
        resolved: ResolvedModel,
        names: TypeNameRegistry,
        config: ValidationConfig,
    }

    fn build(spec: serde_json::Value) -> (Document, Built) {
        let doc = load_from_value(&spec).unwrap();
        let mut diagnostics = Diagnostics::new();
        let roots = doc.schema_roots(&mut diagnostics).unwrap();
        let (resolved, _) = CompositionResolver::new(&doc, false).resolve(&roots).unwrap();
        let (names, _) = TypeNameRegistry::build(&doc, &roots, &resolved, NamingConfig::default()).unwrap();
        (
            doc,
            Built {
                resolved,
                names,
                config: ValidationConfig::default(),
            },
        )
    }

    fn plan(built: &Built, name: &str) -> Procedure {
        let synth = ValidationSynthesizer::new(&built.resolved, &built.names, &built.config);
        synth.synthesize(built.names.node_of(name).unwrap())
    }

    fn field_procedure(procedure: &Procedure, field: &str) -> Procedure {
        let Procedure::Fields { checks, .. } = procedure else {
            panic!("expected field checks, got {:?}", procedure);
        };
        for check in checks {
            if let FieldCheck::Nested {
                field: f,
                target: Target::Inline { procedure },
                ..
            } = check
            {
                if f == field {
                    return (**procedure).clone();
                }
            }
        }
        panic!("no inline check for {}", field);
    }

    #[test]
    fn test_required_array_rejects_nil_with_zero_count() {
        let (_, built) = build(json!({
            "components": { "schemas": {
                "Order": {
                    "type": "object",
                    "required": ["lines"],
                    "properties": {
                        "lines": { "type": "array", "minItems": 1, "items": { "type": "string" } },
                        "notes": { "type": "array", "items": { "type": "string" } },
                        "owner": { "$ref": "#/components/schemas/Owner" }
                    }
                },
                "Owner": {
                    "type": "object",
                    "properties": { "tags": { "type": "array", "maxItems": 3, "items": { "type": "string" } } }
                }
            }}
        }));

        let order = plan(&built, "Order");
        let lines = field_procedure(&order, "lines");
        match lines.nil_outcome() {
            ValidationOutcome::Failure(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].message.contains("got 0"));
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let Procedure::Fields { checks, .. } = &order else { unreachable!() };
        assert_eq!(checks.len(), 2, "notes needs no validation");

        // Optional array, no minItems
        let owner = plan(&built, "Owner");
        assert!(field_procedure(&owner, "tags").nil_outcome().is_success());
    }

    #[test]
    fn test_optimizable_record() {
        let (_, built) = build(json!({
            "components": { "schemas": {
                "User": {
                    "type": "object",
                    "required": ["email"],
                    "properties": {
                        "email": { "type": "string", "format": "email" },
                        "age": { "type": "integer", "minimum": 0 },
                        "nick": { "type": "string" }
                    }
                }
            }}
        }));
        match plan(&built, "User") {
            Procedure::WholeStructure { fields, .. } => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["email", "age"]);
                assert!(fields[0].required);
                assert_eq!(fields[1].rules[0].error, ErrorKind::BelowMinimum);
            }
            other => panic!("expected whole-structure check, got {:?}", other),
        }
    }

    #[test]
    fn test_union_descendant_blocks_optimization() {
        let (_, built) = build(json!({
            "components": { "schemas": {
                "Event": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "minLength": 1 },
                        "payload": { "oneOf": [ { "type": "string" }, { "type": "integer" } ] }
                    }
                }
            }}
        }));
        assert!(matches!(plan(&built, "Event"), Procedure::Fields { .. }));
    }

    #[test]
    fn test_alias_delegates() {
        let (_, built) = build(json!({
            "components": { "schemas": {
                "Code": { "type": "string", "pattern": "^[A-Z]+$" },
                "Wrapped": { "allOf": [ { "$ref": "#/components/schemas/Code" } ] }
            }}
        }));
        assert_eq!(
            plan(&built, "Wrapped"),
            Procedure::Delegate {
                target: Target::Named { name: "Code".to_string() },
                representation: Representation::Scalar(JsonType::String),
                nil: NilPolicy::Accept,
            }
        );
    }

    #[test]
    fn test_alias_of_required_array_rejects_nil() {
        let (_, built) = build(json!({
            "components": { "schemas": {
                "Lines": { "type": "array", "minItems": 1, "items": { "type": "string" } },
                "Alias": { "allOf": [ { "$ref": "#/components/schemas/Lines" } ] }
            }}
        }));

        let target = plan(&built, "Lines").nil_outcome();
        let alias = plan(&built, "Alias");
        assert!(matches!(alias, Procedure::Delegate { nil: NilPolicy::Reject { observed: 0, .. }, .. }));
        assert_eq!(alias.nil_outcome(), target);
        match target {
            ValidationOutcome::Failure(failures) => {
                assert_eq!(failures[0].message, "must have at least 1 items, got 0");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_unconstrained_is_always_valid() {
        let (_, built) = build(json!({
            "components": { "schemas": {
                "Plain": { "type": "object", "properties": { "a": { "type": "string" } } }
            }}
        }));
        let synth = ValidationSynthesizer::new(&built.resolved, &built.names, &built.config);
        let node = built.names.node_of("Plain").unwrap();
        assert!(!synth.needs_validation(node));
        assert!(synth.synthesize(node).is_always_valid());
    }

    #[test]
    fn test_capability_propagates_through_cycle() {
        let (_, built) = build(json!({
            "components": { "schemas": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "next": { "$ref": "#/components/schemas/Node" },
                        "leaf": { "$ref": "#/components/schemas/Leaf" }
                    }
                },
                "Leaf": { "type": "integer", "maximum": 10 }
            }}
        }));
        let synth = ValidationSynthesizer::new(&built.resolved, &built.names, &built.config);
        let node = built.names.node_of("Node").unwrap();
        assert!(synth.needs_validation(node));

        let Procedure::Fields { checks, .. } = synth.synthesize(node) else {
            panic!("expected field checks");
        };
        assert_eq!(
            checks[0],
            FieldCheck::Nested {
                field: "next".to_string(),
                nil_guard: true,
                target: Target::Named { name: "Node".to_string() },
            }
        );
    }

    #[test]
    fn test_invalid_pattern_is_a_diagnostic() {
        let (_, built) = build(json!({
            "components": { "schemas": {
                "Broken": { "type": "string", "pattern": "([a-z" }
            }}
        }));
        let synth = ValidationSynthesizer::new(&built.resolved, &built.names, &built.config);
        let diagnostics = synth.diagnostics();
        assert_eq!(diagnostics.with_code(DiagnosticCode::InvalidPattern).count(), 1);

        let Procedure::Scalar { rules } = plan(&built, "Broken") else {
            panic!("expected scalar rules");
        };
        assert_eq!(
            rules[0].check,
            Check::Pattern {
                pattern: "([a-z".to_string(),
                compiles: Some(false),
            }
        );
    }

    #[test]
    fn test_union_variants() {
        let (_, built) = build(json!({
            "components": { "schemas": {
                "Small": { "type": "integer", "maximum": 5 },
                "Name": { "type": "string" },
                "Choice": { "oneOf": [
                    { "$ref": "#/components/schemas/Small" },
                    { "$ref": "#/components/schemas/Name" }
                ]}
            }}
        }));
        let Procedure::Variants { variants } = plan(&built, "Choice") else {
            panic!("expected variants");
        };
        assert_eq!(variants[0], Target::Named { name: "Small".to_string() });
        assert_eq!(
            variants[1],
            Target::Inline {
                procedure: Box::new(Procedure::AlwaysValid)
            }
        );
    }
}
