//! Command-name contract used for log spans and run bookkeeping.

use crate::cli::parse::{Commands, ProjectCommands, WorkspaceCommands};

/// Dotted command name (e.g. "run", "workspace.switch").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Run { .. } => "run".to_string(),
        Commands::RunAll { .. } => "run_all".to_string(),
        Commands::Types { .. } => "types".to_string(),
        Commands::Processes { .. } => "processes".to_string(),
        Commands::Project { command } => format!("project.{}", project_command_name(command)),
        Commands::Workspace { command } => {
            format!("workspace.{}", workspace_command_name(command))
        }
        Commands::Runs { .. } => "runs".to_string(),
        Commands::Config => "config".to_string(),
    }
}

pub fn project_command_name(command: &ProjectCommands) -> &'static str {
    match command {
        ProjectCommands::New { .. } => "new",
        ProjectCommands::Show { .. } => "show",
    }
}

pub fn workspace_command_name(command: &WorkspaceCommands) -> &'static str {
    match command {
        WorkspaceCommands::List => "list",
        WorkspaceCommands::Show { .. } => "show",
        WorkspaceCommands::New { .. } => "new",
        WorkspaceCommands::Delete { .. } => "delete",
        WorkspaceCommands::Switch { .. } => "switch",
        WorkspaceCommands::Rename { .. } => "rename",
        WorkspaceCommands::Duplicate { .. } => "duplicate",
        WorkspaceCommands::AddProject { .. } => "add_project",
        WorkspaceCommands::RemoveProject { .. } => "remove_project",
        WorkspaceCommands::SelectProject { .. } => "select_project",
        WorkspaceCommands::Set { .. } => "set",
        WorkspaceCommands::Export { .. } => "export",
        WorkspaceCommands::Import { .. } => "import",
    }
}
