//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("fragment.filename", crate::fragment::DEFAULT_FRAGMENT_FILENAME)?
        .set_default("fragment.schema_version", crate::fragment::SCHEMA_VERSION)?
        .set_default("sync.ignore_hidden", false)
}
