//! Config loading facade: the only entry point that assembles sources.

use super::merge::merge_policy;
use super::sources::{environment, global_file, local_file};
use super::LoomConfig;
use crate::error::ApiError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a run started in `cwd`.
    ///
    /// Precedence, lowest first: defaults, global config file, `loom.toml`
    /// in `cwd`, `LOOM__*` environment variables.
    pub fn load(cwd: &Path) -> Result<LoomConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = local_file::add_to_builder(builder, cwd)?;
        let builder = environment::add_to_builder(builder);
        let config: LoomConfig = builder.build()?.try_deserialize()?;
        debug!(data_dir = %config.system.data_dir.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from one explicit file on top of the defaults.
    /// Environment variables still apply.
    pub fn load_from_file(path: &Path) -> Result<LoomConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true));
        let builder = environment::add_to_builder(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load and validate; validation errors are joined into one message.
    pub fn load_validated(cwd: &Path, explicit: Option<&Path>) -> Result<LoomConfig, ApiError> {
        let config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load(cwd)?,
        };
        config.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(config)
    }

    /// Global config file location, if a home directory is known.
    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
