//! CLI parse: clap types for Loom. No behavior; definitions only.

use crate::process::catalog::DEFAULT_GROUP;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Loom CLI - run stored processes against engineering projects
#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Process execution and undoable project state for engineering design projects")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the workspace database (overrides config)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run stored processes of a project, in the order given
    Run {
        /// Project name in the active workspace, or path to a project file
        project: String,
        /// Process names
        #[arg(required = true)]
        processes: Vec<String>,
        /// Task group holding the processes
        #[arg(long, default_value = DEFAULT_GROUP)]
        group: String,
        /// Write the project file back after a successful run
        #[arg(long)]
        save: bool,
    },
    /// Run one stored process in every project of the active workspace
    RunAll {
        /// Process name
        process: String,
        /// Task group holding the process
        #[arg(long, default_value = DEFAULT_GROUP)]
        group: String,
        /// Write each project file back after a successful run
        #[arg(long)]
        save: bool,
    },
    /// List registered node and calculator types
    Types {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List the processes stored in a project, by task group
    Processes {
        /// Project name in the active workspace, or path to a project file
        project: String,
    },
    /// Project file operations
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Workspace and session operations
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommands,
    },
    /// Show recent process runs
    Runs {
        /// Maximum runs to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create an empty project file
    New {
        /// Path of the project file to create
        path: PathBuf,
        /// Project name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show a project's tree
    Show {
        /// Project name in the active workspace, or path to a project file
        project: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum WorkspaceCommands {
    /// List stored workspaces
    List,
    /// Show a workspace (the active one by default)
    Show {
        name: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Create an empty workspace
    New { name: String },
    /// Delete a workspace
    Delete { name: String },
    /// Make a workspace the active one
    Switch { name: String },
    /// Rename a workspace
    Rename { old: String, new: String },
    /// Copy a workspace under a new name
    Duplicate { source: String, target: String },
    /// Add a project file to the active workspace
    AddProject {
        /// Name to refer to the project by
        name: String,
        /// Path to the project file
        path: PathBuf,
    },
    /// Remove a project from the active workspace
    RemoveProject { name: String },
    /// Mark a project of the active workspace as the active project
    SelectProject { name: String },
    /// Set a session preference in the active workspace
    Set { key: String, value: String },
    /// Write a workspace to a JSON file
    Export {
        path: PathBuf,
        /// Workspace to export (the active one by default)
        #[arg(long)]
        name: Option<String>,
    },
    /// Store a workspace read from a JSON file
    Import {
        path: PathBuf,
        /// Replace a stored workspace of the same name
        #[arg(long)]
        force: bool,
    },
}
