//! Codegen Configuration
//!
//! Settings consumed by the naming, composition and validation passes.
//! Shape resolution and pruning are config-free apart from the strictness
//! switch below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Naming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Prepended to names that cannot start an identifier (`"400"` → `"T400"`)
    #[serde(default = "default_safe_prefix")]
    pub safe_prefix: String,

    /// Acronyms kept upper-case inside PascalCase names (`user_id` → `UserID`)
    #[serde(default = "default_acronyms")]
    pub acronyms: BTreeSet<String>,

    /// Names never handed out; a type wanting one gets a numeric suffix
    #[serde(default = "default_reserved")]
    pub reserved: BTreeSet<String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            safe_prefix: default_safe_prefix(),
            acronyms: default_acronyms(),
            reserved: default_reserved(),
        }
    }
}

fn default_safe_prefix() -> String {
    "T".to_string()
}

fn default_acronyms() -> BTreeSet<String> {
    ["ID", "URL", "UUID", "API", "HTTP", "JSON", "XML", "SQL", "URI", "UI", "IO"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_reserved() -> BTreeSet<String> {
    [
        "String", "Vec", "Option", "Result", "Box", "Rc", "Arc", "HashMap", "HashSet",
        "BTreeMap", "BTreeSet",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Composition configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionConfig {
    /// Treat an allOf property defined by several branches as an error
    #[serde(default)]
    pub strict_property_collisions: bool,
}

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Compile every `pattern` and report the ones that fail
    #[serde(default = "default_true")]
    pub check_patterns: bool,

    /// String formats that get their own check
    #[serde(default = "default_checked_formats")]
    pub checked_formats: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_patterns: true,
            checked_formats: default_checked_formats(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_checked_formats() -> Vec<String> {
    ["date", "date-time", "email", "hostname", "ipv4", "ipv6", "uri", "uuid"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
