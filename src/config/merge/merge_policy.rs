//! Merge rules: defaults first, every later source overrides earlier ones.

use crate::config::default_data_dir;
use crate::workspace::run_log::DEFAULT_RUN_LOG_LIMIT;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with the built-in defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default(
            "system.data_dir",
            default_data_dir().to_string_lossy().into_owned(),
        )?
        .set_default("system.run_log_limit", DEFAULT_RUN_LOG_LIMIT as i64)?
        .set_default("executor.max_workers", 4_i64)?
        .set_default("executor.history_depth", 0_i64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
