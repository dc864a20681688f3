//! Loom CLI Binary
//!
//! Batch entry point: runs stored processes and manages workspaces.

use clap::Parser;
use loom::cli::{Cli, RunContext};
use loom::config::{ConfigLoader, LoomConfig};
use loom::logging::init_logging;
use std::path::Path;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("Cannot determine the working directory: {}", e);
            process::exit(1);
        }
    };

    let config = match ConfigLoader::load_validated(&cwd, cli.config.as_deref()) {
        Ok(config) => apply_overrides(config, &cli),
        Err(e) => {
            eprintln!("{}", loom::cli::map_error(&e));
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&config.logging)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Loom CLI starting");

    let context = match RunContext::new(cwd, config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error opening the workspace store: {}", e);
            eprintln!("{}", loom::cli::map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            if !output.text.is_empty() {
                println!("{}", output.text);
            }
            if !output.success {
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", loom::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// CLI flags override the loaded configuration.
fn apply_overrides(mut config: LoomConfig, cli: &Cli) -> LoomConfig {
    if let Some(ref data_dir) = cli.data_dir {
        config.system.data_dir = data_dir.clone();
    }
    if cli.quiet {
        config.logging.enabled = false;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.logging.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.logging.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.logging.file = Some(file.clone());
    }
    if config.logging.output == "file" && config.logging.file.is_none() {
        config.logging.file = Some(default_log_file(&config.system.data_dir));
    }
    config
}

fn default_log_file(data_dir: &Path) -> std::path::PathBuf {
    data_dir.join("loom.log")
}
