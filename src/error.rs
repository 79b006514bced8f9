//! Error types for type-model generation

use thiserror::Error;

/// Result type for type-model operations
pub type Result<T> = std::result::Result<T, TypeModelError>;

/// Type-model generation errors
#[derive(Error, Debug)]
pub enum TypeModelError {
    #[error("Structural conflict in {location}: {conflict}")]
    StructuralConflict {
        location: String,
        conflict: ConflictError,
    },

    #[error("Unresolvable reference {reference}: {reason}{}", suggestion_suffix(.suggestion))]
    UnresolvableReference {
        reference: String,
        reason: String,
        suggestion: Option<String>,
    },

    #[error("Malformed reference {reference}: {reason}")]
    MalformedReference { reference: String, reason: String },

    #[error("Could not find a free name for base {base}")]
    NamingCollisionUnresolved { base: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Strict mode rejected the document: {0}")]
    StrictModeViolation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TypeModelError {
    pub fn conflict(location: impl Into<String>, conflict: ConflictError) -> Self {
        Self::StructuralConflict {
            location: location.into(),
            conflict,
        }
    }

    pub fn unresolvable(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvableReference {
            reference: reference.into(),
            reason: reason.into(),
            suggestion: None,
        }
    }

    pub fn malformed(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean {}?)", s),
        None => String::new(),
    }
}

/// Conflicts raised while merging `allOf` branches or classifying unions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConflictError {
    #[error("incompatible types: {left} vs {right}")]
    IncompatibleTypes { left: String, right: String },

    #[error("conflicting defaults: {left} vs {right}")]
    ConflictingDefaults {
        left: serde_json::Value,
        right: serde_json::Value,
    },

    #[error("branches disagree on {0}")]
    ConflictingFlag(&'static str),

    #[error("conflicting additionalProperties schemas")]
    ConflictingAdditionalProperties,

    #[error("conflicting discriminator: {0}")]
    ConflictingDiscriminator(String),
}
