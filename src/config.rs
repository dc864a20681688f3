//! Configuration System
//!
//! Layered configuration for the Loom runtime: built-in defaults, the user's
//! global config file, a `loom.toml` in the working directory and finally
//! `LOOM__SECTION__KEY` environment variables. Validation collects every
//! problem instead of stopping at the first.

use crate::logging::LoggingConfig;
use crate::workspace::run_log::DEFAULT_RUN_LOG_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;
pub use sources::local_file::LOCAL_CONFIG_FILE;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoomConfig {
    /// Storage locations
    #[serde(default)]
    pub system: SystemConfig,

    /// Process execution settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// System-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Directory holding the workspace database and the run log
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Process runs kept in the run log; older ones are dropped
    #[serde(default = "default_run_log_limit")]
    pub run_log_limit: usize,
}

fn default_run_log_limit() -> usize {
    DEFAULT_RUN_LOG_LIMIT
}

/// Platform data directory for Loom, `.loom` when none can be determined.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "loom")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".loom"))
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            run_log_limit: default_run_log_limit(),
        }
    }
}

impl SystemConfig {
    /// Location of the sled database inside the data directory.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir cannot be empty".to_string());
        }
        if self.run_log_limit == 0 {
            return Err("run_log_limit must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Projects executed concurrently by the worker pool
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Undo entries kept per project; 0 keeps everything
    #[serde(default)]
    pub history_depth: usize,
}

fn default_max_workers() -> usize {
    4
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            history_depth: 0,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    System(String),
    Executor(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::System(msg) => write!(f, "System: {}", msg),
            ValidationError::Executor(msg) => write!(f, "Executor: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl LoomConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.system.validate() {
            errors.push(ValidationError::System(e));
        }
        if let Err(e) = self.executor.validate() {
            errors.push(ValidationError::Executor(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Effective configuration rendered as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
