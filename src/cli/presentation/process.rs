//! Process lifecycle lines and run history.

use crate::process::{ProcessEvent, ProcessStatus};
use crate::workspace::RunRecord;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Batch-mode line for a lifecycle event; `None` for events that are only
/// interesting to interactive front ends.
pub fn format_event(event: &ProcessEvent) -> Option<String> {
    match event {
        ProcessEvent::Started { name, .. } => Some(format!("executing {}", name)),
        ProcessEvent::Warning { message, .. } => Some(format!("WARNING: {}", message)),
        ProcessEvent::Finished {
            name,
            status,
            reason,
            ..
        } => Some(match status {
            ProcessStatus::Failed => format!(
                "process {} failed: {}",
                name,
                reason.as_deref().unwrap_or("unknown error")
            ),
            ProcessStatus::Aborted => format!("process {} aborted", name),
            _ => format!("process {} finished", name),
        }),
        ProcessEvent::Queued { .. }
        | ProcessEvent::StepStarted { .. }
        | ProcessEvent::Progress { .. } => None,
    }
}

fn status_text(status: ProcessStatus) -> String {
    match status {
        ProcessStatus::Finished => status.as_str().green().to_string(),
        ProcessStatus::FinishedWithWarning => status.as_str().yellow().to_string(),
        ProcessStatus::Failed => status.as_str().red().to_string(),
        ProcessStatus::Aborted => status.as_str().magenta().to_string(),
        _ => status.as_str().to_string(),
    }
}

pub fn format_runs_text(runs: &[RunRecord]) -> String {
    if runs.is_empty() {
        return "No runs recorded.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Started", "Project", "Process", "Status", "Duration", "Warnings"]);
    for run in runs {
        let millis = (run.finished_at - run.started_at).num_milliseconds().max(0);
        table.add_row(vec![
            run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            run.project.clone(),
            run.process.clone(),
            status_text(run.status),
            format!("{} ms", millis),
            run.warnings.len().to_string(),
        ]);
    }
    table.to_string()
}

pub fn format_runs_json(runs: &[RunRecord]) -> String {
    serde_json::to_string_pretty(runs).unwrap_or_else(|_| "[]".to_string())
}
