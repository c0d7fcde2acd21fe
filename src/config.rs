//! Configuration for the catalog tooling
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (careplan-schemas.toml)
//! - Environment variables (CAREPLAN_SCHEMAS__*)
//!
//! ## Example config file (careplan-schemas.toml):
//! ```toml
//! [validation]
//! reject_unknown_fields = true
//! apply_defaults = true
//!
//! [export]
//! output_format = "compact"
//! include_checksums = true
//! output = "build/descriptors.json"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::validate::ValidationOptions;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

/// Validation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Report record keys the entity does not declare
    #[serde(default)]
    pub reject_unknown_fields: bool,

    /// Fill declared defaults before validating
    #[serde(default)]
    pub apply_defaults: bool,
}

impl ValidationConfig {
    pub fn options(&self) -> ValidationOptions {
        ValidationOptions {
            reject_unknown_fields: self.reject_unknown_fields,
        }
    }
}

/// Export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Export the checksummed manifest rather than bare descriptors
    #[serde(default = "default_true")]
    pub include_checksums: bool,

    /// Output file; stdout when unset
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl OutputFormat {
    pub fn to_json<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

fn default_true() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Pretty,
            include_checksums: true,
            output: None,
        }
    }
}

impl CatalogConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "careplan-schemas.toml",
            ".careplan-schemas.toml",
            "config/careplan-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(dirs) = directories::ProjectDirs::from("dev", "careplan", "careplan-schemas") {
            let xdg_config = dirs.config_dir().join("careplan-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CAREPLAN_SCHEMAS")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
