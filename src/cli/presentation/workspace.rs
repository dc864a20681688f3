//! Workspace listing and detail.

use crate::workspace::Workspace;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_workspace_list(names: &[String], active: &str) -> String {
    if names.is_empty() {
        return format!("No workspaces stored. Active: {}", active);
    }
    let mut output = String::from("Workspaces:\n");
    for name in names {
        if name == active {
            output.push_str(&format!("* {}\n", name.green()));
        } else {
            output.push_str(&format!("  {}\n", name));
        }
    }
    output.push_str(&format!("\nTotal: {} workspace(s)", names.len()));
    output
}

pub fn format_workspace_show_text(workspace: &Workspace, active: bool) -> String {
    let mut output = format!("{}", format!("Workspace: {}", workspace.name).bold());
    if active {
        output.push_str(" (active)");
    }
    output.push('\n');
    output.push_str(&format!(
        "Active project: {}\n",
        workspace.active_project.as_deref().unwrap_or("-")
    ));

    if workspace.project_refs.is_empty() {
        output.push_str("\nNo projects.\n");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Project", "Path", "State"]);
        for project in &workspace.project_refs {
            let state = if project.path.exists() {
                "ok".to_string()
            } else {
                "missing".red().to_string()
            };
            table.add_row(vec![
                project.name.clone(),
                project.path.display().to_string(),
                state,
            ]);
        }
        output.push_str(&format!("\n{}\n", table));
    }

    if !workspace.preferences.is_empty() {
        output.push_str("\nPreferences:\n");
        for (key, value) in &workspace.preferences {
            output.push_str(&format!("  {} = {}\n", key, value));
        }
    }
    output.trim_end().to_string()
}
