//! Logging System
//!
//! Structured logging through `tracing`. Levels, format and destination come
//! from the `[logging]` config section and can be overridden with
//! `LOOM_LOG`, `LOOM_LOG_FORMAT` and `LOOM_LOG_OUTPUT`. Logs default to
//! stderr so that command output on stdout stays clean.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const ENV_LOG: &str = "LOOM_LOG";
pub const ENV_LOG_FORMAT: &str = "LOOM_LOG_FORMAT";
pub const ENV_LOG_OUTPUT: &str = "LOOM_LOG_OUTPUT";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Turn logging off entirely
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path, required when output is "file"
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Colored output (text format on a terminal stream only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `loom::process = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        parse_format(&self.format)?;
        let output = parse_output(&self.output)?;
        if output == Output::File && self.file.is_none() {
            return Err("output 'file' requires logging.file".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Stdout,
    Stderr,
    File,
}

fn parse_format(format: &str) -> Result<Format, String> {
    match format {
        "text" => Ok(Format::Text),
        "json" => Ok(Format::Json),
        other => Err(format!("invalid log format '{}' (must be 'json' or 'text')", other)),
    }
}

fn parse_output(output: &str) -> Result<Output, String> {
    match output {
        "stdout" => Ok(Output::Stdout),
        "stderr" => Ok(Output::Stderr),
        "file" => Ok(Output::File),
        other => Err(format!(
            "invalid log output '{}' (must be 'stdout', 'stderr' or 'file')",
            other
        )),
    }
}

/// Initialize the global subscriber.
///
/// Priority (highest first): environment variables, the given config,
/// defaults. Calling it twice is harmless; the second call is ignored.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);
    if !config.enabled {
        return Ok(());
    }

    let filter = build_env_filter(config)?;

    let format = match std::env::var(ENV_LOG_FORMAT) {
        Ok(value) => parse_format(&value),
        Err(_) => parse_format(&config.format),
    }
    .map_err(ApiError::ConfigError)?;
    let output = match std::env::var(ENV_LOG_OUTPUT) {
        Ok(value) => parse_output(&value),
        Err(_) => parse_output(&config.output),
    }
    .map_err(ApiError::ConfigError)?;

    let (writer, ansi) = match output {
        Output::Stdout => (BoxMakeWriter::new(std::io::stdout), config.color),
        Output::Stderr => (BoxMakeWriter::new(std::io::stderr), config.color),
        Output::File => (BoxMakeWriter::new(open_log_file(config)?), false),
    };

    let base = Registry::default().with(filter);
    let result = match format {
        Format::Json => base
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        Format::Text => base
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
    Ok(())
}

fn open_log_file(config: &LoggingConfig) -> Result<std::sync::Mutex<std::fs::File>, ApiError> {
    let path = config
        .file
        .clone()
        .ok_or_else(|| ApiError::ConfigError("output 'file' requires logging.file".into()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            ApiError::ConfigError(format!("Failed to open log file {}: {}", path.display(), e))
        })?;
    Ok(std::sync::Mutex::new(file))
}

/// Filter from `LOOM_LOG` if set, otherwise from the configured level and
/// module directives.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_LOG) {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in &config.modules {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| ApiError::ConfigError(format!("Invalid log directive: {}", e)))?,
        );
    }
    Ok(filter)
}
