//! Configuration loading facade.

use super::{merge, sources, FragsyncConfig};
use crate::error::FragmentError;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads [`FragsyncConfig`] from the layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{FRAGSYNC_ENV}.toml`,
    /// `FRAGSYNC__SECTION__KEY` environment variables.
    pub fn load(workspace_root: &Path) -> Result<FragsyncConfig, FragmentError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            Environment::with_prefix("FRAGSYNC")
                .separator("__")
                .try_parsing(true),
        );

        let config: FragsyncConfig = builder.build()?.try_deserialize()?;
        debug!(
            workspace_root = %workspace_root.display(),
            fragment_filename = %config.fragment.filename,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load configuration from a single file on top of the defaults
    pub fn load_from_file(path: &Path) -> Result<FragsyncConfig, FragmentError> {
        let config = merge::merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Defaults only
    pub fn defaults() -> Result<FragsyncConfig, FragmentError> {
        let config: Config = merge::merge_policy::builder_with_defaults()?.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Location of the global config file, if a home directory is known
    pub fn xdg_config_path() -> Option<PathBuf> {
        sources::global_file::global_config_path()
    }
}
