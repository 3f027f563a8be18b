//! Configuration System
//!
//! Layered configuration for fragment documents, reconciliation and logging.
//! Sources are merged by the `config` crate: built-in defaults, the global
//! config file, workspace config files, then `FRAGSYNC__*` environment variables.

use crate::error::FragmentError;
use crate::fragment::{DEFAULT_FRAGMENT_FILENAME, FRAGMENT_NAMESPACE, SCHEMA_VERSION};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragsyncConfig {
    /// Settings stamped into new fragment documents
    #[serde(default)]
    pub fragment: FragmentConfig,

    /// Reconciliation settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fragment document settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FragmentConfig {
    /// Name of the fragment file inside each described folder
    #[serde(default = "default_filename")]
    pub filename: String,

    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default = "default_schema_location")]
    pub schema_location: String,

    /// Identifier of the item store driver that owns the described folder
    #[serde(default = "default_item_driver")]
    pub item_driver: String,

    #[serde(default = "default_sync_driver")]
    pub sync_driver: String,

    /// Reserved; empty unless a storage driver is in use
    #[serde(default)]
    pub storage_driver: String,
}

fn default_filename() -> String {
    DEFAULT_FRAGMENT_FILENAME.to_string()
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_schema_location() -> String {
    format!("{} fragment.xsd", FRAGMENT_NAMESPACE)
}

fn default_item_driver() -> String {
    "local".to_string()
}

fn default_sync_driver() -> String {
    "fragsync".to_string()
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            filename: default_filename(),
            schema_version: default_schema_version(),
            schema_location: default_schema_location(),
            item_driver: default_item_driver(),
            sync_driver: default_sync_driver(),
            storage_driver: String::new(),
        }
    }
}

/// Reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Store entry names never turned into associations
    #[serde(default = "default_ignore_names")]
    pub ignore_names: Vec<String>,

    /// Skip store entries whose name starts with `.`
    #[serde(default)]
    pub ignore_hidden: bool,
}

fn default_ignore_names() -> Vec<String> {
    vec![".DS_Store".to_string(), "Thumbs.db".to_string()]
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignore_names: default_ignore_names(),
            ignore_hidden: false,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Fragment(String),
    Sync(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Fragment(msg) => write!(f, "Fragment: {}", msg),
            ValidationError::Sync(msg) => write!(f, "Sync: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl FragmentConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.filename.is_empty() {
            return Err("Fragment filename cannot be empty".to_string());
        }
        if self.filename.contains('/') || self.filename.contains('\\') {
            return Err(format!(
                "Fragment filename '{}' must be a single path segment",
                self.filename
            ));
        }
        if self.schema_version.is_empty() {
            return Err("Schema version cannot be empty".to_string());
        }
        Ok(())
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = self.ignore_names.iter().find(|name| name.is_empty()) {
            return Err(format!("Ignore list contains an empty name: {:?}", name));
        }
        Ok(())
    }
}

impl FragsyncConfig {
    /// Validate the entire configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.fragment.validate() {
            errors.push(ValidationError::Fragment(e));
        }
        if let Err(e) = self.sync.validate() {
            errors.push(ValidationError::Sync(e));
        }
        if !matches!(self.logging.format.as_str(), "json" | "text") {
            errors.push(ValidationError::Logging(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all problems into one error
    pub fn ensure_valid(&self) -> Result<(), FragmentError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            FragmentError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }

    /// Render as TOML, e.g. to seed a workspace config file
    pub fn to_toml(&self) -> Result<String, FragmentError> {
        toml::to_string_pretty(self).map_err(|e| FragmentError::Config(e.to_string()))
    }

    /// Write this configuration to a TOML file, creating parent directories
    pub fn write_to(&self, path: &Path) -> Result<PathBuf, FragmentError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FragmentError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| {
            FragmentError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })?;
        Ok(path.to_path_buf())
    }
}
