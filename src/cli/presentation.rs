//! CLI presentation: text and json formatters per command family.

mod process;
mod project;
mod registry;
mod workspace;

pub use process::{format_event, format_runs_json, format_runs_text};
pub use project::{format_process_names, format_project_text};
pub use registry::{format_types_json, format_types_text};
pub use workspace::{format_workspace_list, format_workspace_show_text};
