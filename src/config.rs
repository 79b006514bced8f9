//! Configuration management for type-model generation
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (typemodel.toml)
//! - Environment variables (TYPEMODEL__*)
//!
//! ## Example config file (typemodel.toml):
//! ```toml
//! [naming]
//! safe_prefix = "T"
//! acronyms = ["ID", "URL", "HTTP"]
//!
//! [composition]
//! strict_property_collisions = false
//!
//! [pruning]
//! enabled = true
//!
//! [validation]
//! check_patterns = true
//!
//! [filter]
//! tags = ["pets"]
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::codegen::config::{CompositionConfig, NamingConfig, ValidationConfig};

/// Main configuration for a generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeModelConfig {
    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub composition: CompositionConfig,

    #[serde(default)]
    pub pruning: PruningConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Operation filters applied before pruning
    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Pruning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruningConfig {
    /// Delete components no retained operation reaches
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Operation filter configuration; empty lists keep everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub operation_ids: Vec<String>,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.operation_ids.is_empty()
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

fn default_true() -> bool {
    true
}

impl TypeModelConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["typemodel.toml", ".typemodel.toml", "config/typemodel.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "typemodel") {
            let xdg_config = config_dir.config_dir().join("typemodel.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // TYPEMODEL__NAMING__SAFE_PREFIX=X
        builder = builder.add_source(
            Environment::with_prefix("TYPEMODEL")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
