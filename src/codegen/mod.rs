//! Type Model Generation
//!
//! Drives the whole pipeline over an explicit `GenerationContext`:
//!
//! ```text
//! filter → prune → schema roots → compose/classify → names → validation → descriptors
//! ```
//!
//! Every phase returns a typed result. This module is the only place that
//! logs; phases below it stay silent and report through `Diagnostics`.
//!
//! A `StructuralConflict` or `UnresolvableReference` anywhere aborts the run
//! before any name is assigned, so there is never a partial model.

pub mod config;
pub mod names;
pub mod types;
pub mod validate;

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info, info_span, warn};

use crate::config::TypeModelConfig;
use crate::error::{Result, TypeModelError};
use crate::graph::{
    prune, retain_operation_ids, retain_tags, CompositionResolver, Diagnostics, Document,
    FilterReport, PruneReport, ResolvedModel, SchemaId, Severity,
};

pub use names::{NameSource, TypeIdentity, TypeNameRegistry};
pub use types::{DescriptorBuilder, Dispatch, FieldDef, FieldType, TypeDescriptor, TypeKind, VariantDef};
pub use validate::{
    Check, ErrorKind, FailureMode, FieldCheck, FieldRules, NilPolicy, Procedure, Representation,
    Target, ValidationFailure, ValidationOutcome, ValidationRule, ValidationSynthesizer,
};

// =============================================================================
// Generation Context
// =============================================================================

/// Everything a run reads or mutates, threaded through every phase
pub struct GenerationContext {
    pub document: Document,
    pub config: TypeModelConfig,
    pub diagnostics: Diagnostics,
}

impl GenerationContext {
    pub fn new(document: Document, config: TypeModelConfig) -> Self {
        Self {
            document,
            config,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Apply the configured tag / operationId filters
    pub fn filter(&mut self) -> FilterReport {
        let filter = &self.config.filter;
        let mut report = FilterReport::default();
        if !filter.tags.is_empty() {
            report = retain_tags(&mut self.document, &filter.tags);
        }
        if !filter.operation_ids.is_empty() {
            let by_id = retain_operation_ids(&mut self.document, &filter.operation_ids);
            report.removed_operations.extend(by_id.removed_operations);
            report.removed_paths.extend(by_id.removed_paths);
        }
        report
    }

    /// Delete unreachable components, unless pruning is switched off
    pub fn prune(&mut self) -> Result<Option<PruneReport>> {
        if !self.config.pruning.enabled {
            return Ok(None);
        }
        prune(&mut self.document).map(Some)
    }
}

// =============================================================================
// Type Model
// =============================================================================

/// The finished model: named types, their descriptors and check plans
#[derive(Debug, Clone, Serialize)]
pub struct TypeModel {
    /// Registry order
    pub types: Vec<TypeDescriptor>,
    /// name -> node
    pub names: BTreeMap<String, SchemaId>,
    pub diagnostics: Diagnostics,
    pub filter: FilterReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune: Option<PruneReport>,
}

#[derive(Serialize)]
struct FingerprintView<'a> {
    types: &'a [TypeDescriptor],
    names: &'a BTreeMap<String, SchemaId>,
}

impl TypeModel {
    /// Run the full pipeline over `document`
    pub fn build(document: Document, config: &TypeModelConfig) -> Result<Self> {
        let span = info_span!("typemodel", title = document.title.as_deref().unwrap_or(""));
        let _guard = span.enter();

        let mut ctx = GenerationContext::new(document, config.clone());

        let filter = ctx.filter();
        if !config.filter.is_empty() {
            info!(
                operations_removed = filter.removed_operations.len(),
                paths_removed = filter.removed_paths.len(),
                "Filtered operations"
            );
        }

        let prune = ctx.prune()?;
        if let Some(report) = &prune {
            for (pass, deleted) in report.passes.iter().enumerate() {
                debug!(pass, deleted, "Prune pass");
            }
            info!(
                passes = report.pass_count(),
                deleted = report.total_deleted(),
                "Pruned unreachable components"
            );
        }

        let roots = ctx.document.schema_roots(&mut ctx.diagnostics)?;
        let resolver = CompositionResolver::new(&ctx.document, config.composition.strict_property_collisions);
        let (resolved, composed) = resolver.resolve(&roots)?;
        ctx.diagnostics.merge(composed);
        info!(roots = roots.len(), nodes = resolved.len(), "Resolved composition");

        if ctx.diagnostics.has_errors() {
            let first = ctx
                .diagnostics
                .errors()
                .next()
                .map(|d| d.to_string())
                .unwrap_or_default();
            return Err(TypeModelError::StrictModeViolation(format!(
                "{} error(s), first: {}",
                ctx.diagnostics.error_count(),
                first
            )));
        }

        let (names, naming) = TypeNameRegistry::build(&ctx.document, &roots, &resolved, config.naming.clone())?;
        ctx.diagnostics.merge(naming);
        info!(types = names.len(), "Assigned type names");

        let types = Self::describe(&resolved, &names, &config.validation, &mut ctx.diagnostics);
        info!(
            validated = types.iter().filter(|t| t.needs_validation).count(),
            "Synthesized validation"
        );

        for item in ctx.diagnostics.all().iter().filter(|d| d.severity == Severity::Warning) {
            warn!("{}", item);
        }

        Ok(Self {
            names: names
                .table()
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
            types,
            diagnostics: ctx.diagnostics,
            filter,
            prune,
        })
    }

    fn describe(
        resolved: &ResolvedModel,
        names: &TypeNameRegistry,
        validation: &config::ValidationConfig,
        diagnostics: &mut Diagnostics,
    ) -> Vec<TypeDescriptor> {
        let synth = ValidationSynthesizer::new(resolved, names, validation);
        diagnostics.merge(synth.diagnostics());
        let builder = DescriptorBuilder::new(resolved, names);

        names
            .iter()
            .zip(synth.synthesize_all())
            .map(|(identity, (_, validation))| TypeDescriptor {
                name: identity.name.clone(),
                node: identity.node,
                source: identity.source,
                kind: builder.kind(identity.node),
                nullable: resolved.get(identity.node).is_some_and(|s| s.is_nullable()),
                needs_validation: synth.needs_validation(identity.node),
                validation,
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// SHA-256 over names, descriptors and plans
    pub fn fingerprint(&self) -> String {
        let view = FingerprintView {
            types: &self.types,
            names: &self.names,
        };
        let mut hasher = Sha256::new();
        // Serializing plain data into a Vec cannot fail
        if let Ok(bytes) = serde_json::to_vec(&view) {
            hasher.update(&bytes);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::load_from_value;
    use serde_json::json;

    fn petstore() -> serde_json::Value {
        json!({
            "info": { "title": "pets" },
            "paths": {
                "/pets": {
                    "get": {
                        "operationId": "listPets",
                        "tags": ["pets"],
                        "responses": {
                            "200": { "description": "ok", "content": { "application/json": { "schema": {
                                "type": "array", "items": { "$ref": "#/components/schemas/Pet" }
                            }}}}
                        }
                    }
                }
            },
            "components": { "schemas": {
                "Pet": {
                    "type": "object",
                    "required": ["name"],
                    "properties": { "name": { "type": "string", "minLength": 1 } }
                },
                "Unused": { "type": "object", "properties": { "x": { "type": "string" } } }
            }}
        })
    }

    #[test]
    fn test_build_prunes_and_names() {
        let doc = load_from_value(&petstore()).unwrap();
        let model = TypeModel::build(doc, &TypeModelConfig::default()).unwrap();

        assert!(model.get("Pet").is_some());
        assert!(model.get("Unused").is_none());
        assert_eq!(model.prune.as_ref().unwrap().total_deleted(), 1);

        let pet = model.get("Pet").unwrap();
        assert!(pet.needs_validation);
        assert!(matches!(pet.kind, TypeKind::Struct { .. }));
    }

    #[test]
    fn test_pruning_can_be_disabled() {
        let doc = load_from_value(&petstore()).unwrap();
        let mut config = TypeModelConfig::default();
        config.pruning.enabled = false;
        let model = TypeModel::build(doc, &config).unwrap();
        assert!(model.get("Unused").is_some());
        assert!(model.prune.is_none());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = TypeModel::build(load_from_value(&petstore()).unwrap(), &TypeModelConfig::default()).unwrap();
        let b = TypeModel::build(load_from_value(&petstore()).unwrap(), &TypeModelConfig::default()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_strict_property_collisions_abort() {
        let doc = load_from_value(&json!({
            "components": { "schemas": {
                "A": { "type": "object", "properties": { "id": { "type": "string" } } },
                "B": {
                    "allOf": [
                        { "$ref": "#/components/schemas/A" },
                        { "type": "object", "properties": { "id": { "type": "integer" } } }
                    ]
                }
            }}
        }))
        .unwrap();
        let mut config = TypeModelConfig::default();
        config.pruning.enabled = false;

        let lenient = TypeModel::build(doc.clone(), &config).unwrap();
        assert_eq!(lenient.diagnostics.warning_count(), 1);

        config.composition.strict_property_collisions = true;
        let err = TypeModel::build(doc, &config).unwrap_err();
        assert!(matches!(err, TypeModelError::StrictModeViolation(_)));
    }
}
