//! Local config file source: loom.toml in the working directory.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::Path;

pub const LOCAL_CONFIG_FILE: &str = "loom.toml";

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    cwd: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = cwd.join(LOCAL_CONFIG_FILE);
    if !path.exists() {
        return Ok(builder);
    }
    Ok(builder.add_source(File::from(path).required(false)))
}
