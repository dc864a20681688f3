//! Global config file source: $XDG_CONFIG_HOME/loom/config.toml or ~/.config/loom/config.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::PathBuf;
use tracing::debug;

/// Path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("loom").join("config.toml"))
}

/// Add the global config file to the builder if it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = global_config_path() else {
        return Ok(builder);
    };
    if !path.exists() {
        debug!(config_path = %path.display(), "No global configuration file");
        return Ok(builder);
    }
    let path = path.canonicalize().unwrap_or(path);
    Ok(builder.add_source(File::from(path).required(false)))
}
