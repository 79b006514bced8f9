//! OpenAPI Type Model
//!
//! Turns an OpenAPI document into a closed, uniquely-named, validated type
//! model ready for code synthesis.
//!
//! ## Pipeline
//!
//! ```text
//! load → filter → prune → compose/classify → name → validate → descriptors
//! ```
//!
//! - **graph**: the document model, reference handling, `allOf` merging,
//!   union classification, reachability pruning and diagnostics
//! - **codegen**: name assignment, validation synthesis, type descriptors and
//!   the pipeline driver
//!
//! ## Example
//!
//! ```no_run
//! use oapi_typemodel::{graph::load_from_str, config::TypeModelConfig, TypeModel};
//!
//! let doc = load_from_str(r#"{"openapi": "3.0.3", "paths": {}}"#)?;
//! let model = TypeModel::build(doc, &TypeModelConfig::default())?;
//! println!("{}", model.fingerprint());
//! # Ok::<(), oapi_typemodel::TypeModelError>(())
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod graph;

pub use codegen::{
    GenerationContext, Procedure, TypeDescriptor, TypeKind, TypeModel, TypeNameRegistry,
    ValidationOutcome, ValidationSynthesizer,
};
pub use config::TypeModelConfig;
pub use error::{ConflictError, Result, TypeModelError};
pub use graph::{CompositionResolver, Diagnostics, Document};
