//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::output::CommandOutput;
use crate::cli::parse::{Commands, ProjectCommands, WorkspaceCommands};
use crate::cli::presentation::{
    format_event, format_process_names, format_project_text, format_runs_json, format_runs_text,
    format_types_json, format_types_text, format_workspace_list, format_workspace_show_text,
};
use crate::cli::command_name;
use crate::config::LoomConfig;
use crate::error::{ApiError, StorageError};
use crate::plugin::{Plugin, Registries};
use crate::process::catalog::{DEFAULT_GROUP, PROCESS_DATA_TYPE};
use crate::process::{
    EventBus, ProcessCatalog, ProcessEvent, ProcessExecutor, ProjectJob, RunSummary, WorkerPool,
};
use crate::project::Project;
use crate::workspace::{project_file, LoadedProject, RunLog, RunRecord, Workspace, WorkspaceStore};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn};

/// Runtime context for CLI execution: working directory, effective config,
/// registries and the workspace database.
pub struct RunContext {
    cwd: PathBuf,
    config: LoomConfig,
    registries: Registries,
    workspaces: WorkspaceStore,
    runs: RunLog,
}

impl RunContext {
    /// Open the workspace database under the configured data directory and
    /// install the core plugin.
    pub fn new(cwd: PathBuf, config: LoomConfig) -> Result<Self, ApiError> {
        let registries = Registries::with_core()?;
        let store_path = config.system.store_path();
        std::fs::create_dir_all(&store_path).map_err(StorageError::IoError)?;
        let workspaces = WorkspaceStore::open(&store_path)?;
        let runs = RunLog::with_limit(workspaces.db().clone(), config.system.run_log_limit)?;
        info!(store = %store_path.display(), "Run context ready");
        Ok(Self {
            cwd,
            config,
            registries,
            workspaces,
            runs,
        })
    }

    pub fn config(&self) -> &LoomConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Install an additional plugin before executing commands.
    pub fn install(&self, plugin: &dyn Plugin) -> Result<usize, ApiError> {
        Ok(self.registries.install(plugin)?)
    }

    pub fn workspaces(&self) -> &WorkspaceStore {
        &self.workspaces
    }

    pub fn run_log(&self) -> &RunLog {
        &self.runs
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        let name = command_name(command);
        let span = info_span!("command", command = %name);
        let _entered = span.enter();
        let started = Instant::now();

        let result = self.execute_inner(command);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(output) => info!(success = output.success, elapsed_ms, "Command completed"),
            Err(e) => warn!(error = %e, elapsed_ms, "Command failed"),
        }
        if let Err(e) = self.workspaces.flush() {
            warn!(error = %e, "Failed to flush workspace store");
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Run {
                project,
                processes,
                group,
                save,
            } => self.handle_run(project, processes, group, *save),
            Commands::RunAll { process, group, save } => self.handle_run_all(process, group, *save),
            Commands::Types { format } => Ok(if format == "json" {
                format_types_json(&self.registries).into()
            } else {
                format_types_text(&self.registries).into()
            }),
            Commands::Processes { project } => {
                let (_, loaded) = self.load_project(project)?;
                let groups = ProcessCatalog::groups(loaded.project.tree());
                Ok(format_process_names(loaded.project.name(), &groups).into())
            }
            Commands::Project { command } => self.handle_project_command(command),
            Commands::Workspace { command } => self.handle_workspace_command(command),
            Commands::Runs { limit, format } => {
                let runs = self.runs.recent(*limit)?;
                Ok(if format == "json" {
                    format_runs_json(&runs).into()
                } else {
                    format_runs_text(&runs).into()
                })
            }
            Commands::Config => {
                let rendered = self
                    .config
                    .to_toml()
                    .map_err(|e| ApiError::ConfigError(e.to_string()))?;
                Ok(rendered.into())
            }
        }
    }

    fn handle_run(
        &self,
        spec: &str,
        names: &[String],
        group: &str,
        save: bool,
    ) -> Result<CommandOutput, ApiError> {
        let (path, loaded) = self.load_project(spec)?;
        let mut lines = skipped_lines(&loaded);
        let skipped = loaded.skipped.len();
        let mut project = loaded.project;

        let processes = names
            .iter()
            .map(|name| {
                ProcessCatalog::find_in_group(project.tree(), group, name)
                    .ok_or_else(|| ApiError::ProcessNotFound(qualified(group, name)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (events, rx) = EventBus::new_pair();
        let mut executor = ProcessExecutor::with_events(Arc::clone(&self.registries.calculators), events);
        for process in processes {
            executor.submit(process);
        }
        let summary = executor.run(&mut project);
        drop(executor);

        lines.extend(drain_lines(&rx));
        self.record(&summary)?;
        let mut success = summary.all_succeeded();
        if save {
            lines.push(self.save_after_run(&path, &project, success, skipped)?);
            success &= skipped == 0;
        }
        Ok(CommandOutput {
            text: lines.join("\n"),
            success,
        })
    }

    /// Run `process` in every project of the active workspace on the worker
    /// pool. Projects that lack the process are reported and skipped.
    fn handle_run_all(&self, process: &str, group: &str, save: bool) -> Result<CommandOutput, ApiError> {
        let (workspace, _) = self.workspaces.load_active()?;
        if workspace.project_refs.is_empty() {
            return Ok(CommandOutput::ok(format!(
                "No projects in workspace {}",
                workspace.name
            )));
        }

        let mut lines = Vec::new();
        let mut success = true;
        let mut jobs = Vec::new();
        let mut pending = Vec::new();
        for project_ref in &workspace.project_refs {
            let path = self.absolute(&project_ref.path);
            let loaded = match self.open_project(&path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    lines.push(format!("[{}] {}", project_ref.name, e));
                    success = false;
                    continue;
                }
            };
            lines.extend(
                skipped_lines(&loaded)
                    .into_iter()
                    .map(|line| format!("[{}] {}", project_ref.name, line)),
            );
            let Some(found) = ProcessCatalog::find_in_group(loaded.project.tree(), group, process) else {
                lines.push(format!("[{}] {} not found", project_ref.name, qualified(group, process)));
                success = false;
                continue;
            };
            let (events, rx) = EventBus::new_pair();
            let mut executor = ProcessExecutor::with_events(Arc::clone(&self.registries.calculators), events);
            executor.submit(found);
            let skipped = loaded.skipped.len();
            let project = Arc::new(Mutex::new(loaded.project));
            jobs.push(ProjectJob::new(Arc::clone(&project), executor));
            pending.push((project_ref.name.clone(), path, project, skipped, rx));
        }

        let pool = WorkerPool::new(self.config.executor.max_workers);
        let results = pool
            .run_projects_blocking(jobs)
            .map_err(StorageError::IoError)?;

        for ((name, path, project, skipped, rx), result) in pending.into_iter().zip(results) {
            lines.extend(drain_lines(&rx).into_iter().map(|line| format!("[{}] {}", name, line)));
            match result {
                Ok(summary) => {
                    self.record(&summary)?;
                    let ok = summary.all_succeeded();
                    success &= ok;
                    if save {
                        let line = self.save_after_run(&path, &project.lock(), ok, skipped)?;
                        lines.push(format!("[{}] {}", name, line));
                        success &= skipped == 0;
                    }
                }
                Err(e) => {
                    lines.push(format!("[{}] {}", name, e));
                    success = false;
                }
            }
        }
        Ok(CommandOutput {
            text: lines.join("\n"),
            success,
        })
    }

    fn handle_project_command(&self, command: &ProjectCommands) -> Result<CommandOutput, ApiError> {
        match command {
            ProjectCommands::New { path, name, force } => {
                let path = self.absolute(path);
                if path.exists() && !*force {
                    return Err(StorageError::AlreadyExists(path.display().to_string()).into());
                }
                let name = match name {
                    Some(name) => name.clone(),
                    None => path
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .ok_or_else(|| {
                            ApiError::ConfigError(format!("Cannot derive a project name from {}", path.display()))
                        })?,
                };
                let mut project = Project::new(name, Arc::clone(&self.registries.nodes))?;
                let processes = project.create_node(PROCESS_DATA_TYPE, "Processes")?;
                let root = project.root_id();
                project.append_child(root, processes)?;
                project_file::save(&path, &project)?;
                info!(project = project.name(), path = %path.display(), "Project created");
                Ok(format!("Created project {} at {}", project.name(), path.display()).into())
            }
            ProjectCommands::Show { project, format } => {
                let (_, loaded) = self.load_project(project)?;
                if format == "json" {
                    Ok(loaded.project.tree().to_json()?.into())
                } else {
                    let mut lines = skipped_lines(&loaded);
                    lines.push(format_project_text(&loaded.project));
                    Ok(lines.join("\n").into())
                }
            }
        }
    }

    fn handle_workspace_command(&self, command: &WorkspaceCommands) -> Result<CommandOutput, ApiError> {
        match command {
            WorkspaceCommands::List => {
                let names = self.workspaces.list()?;
                let active = self.workspaces.active()?;
                Ok(format_workspace_list(&names, &active).into())
            }
            WorkspaceCommands::Show { name, format } => {
                let active = self.workspaces.active()?;
                let (workspace, fallback) = match name {
                    Some(name) => (self.workspaces.load(name)?, None),
                    None => self.workspaces.load_or_default(&active),
                };
                if format == "json" {
                    return serde_json::to_string_pretty(&workspace)
                        .map(CommandOutput::from)
                        .map_err(|e| StorageError::Serialization(e.to_string()).into());
                }
                let mut output = String::new();
                if let Some(err) = fallback {
                    output.push_str(&format!("WARNING: {}; showing the default workspace\n", err));
                }
                output.push_str(&format_workspace_show_text(&workspace, workspace.name == active));
                Ok(output.into())
            }
            WorkspaceCommands::New { name } => {
                if self.workspaces.exists(name)? {
                    return Err(StorageError::AlreadyExists(format!("workspace '{}'", name)).into());
                }
                self.workspaces.save(&Workspace::new(name.as_str()))?;
                Ok(format!("Created workspace {}", name).into())
            }
            WorkspaceCommands::Delete { name } => {
                self.workspaces.delete(name)?;
                Ok(format!("Deleted workspace {}", name).into())
            }
            WorkspaceCommands::Switch { name } => {
                self.workspaces.set_active(name)?;
                Ok(format!("Active workspace: {}", name).into())
            }
            WorkspaceCommands::Rename { old, new } => {
                self.workspaces.rename(old, new)?;
                Ok(format!("Renamed workspace {} to {}", old, new).into())
            }
            WorkspaceCommands::Duplicate { source, target } => {
                self.workspaces.duplicate(source, target)?;
                Ok(format!("Duplicated workspace {} as {}", source, target).into())
            }
            WorkspaceCommands::AddProject { name, path } => {
                let path = self.absolute(path);
                let mut workspace = self.active_workspace()?;
                workspace.add_project(name.as_str(), path.clone())?;
                self.workspaces.save(&workspace)?;
                let mut output = format!("Added project {} to workspace {}", name, workspace.name);
                if !path.exists() {
                    output.push_str(&format!("\nWARNING: {} does not exist yet", path.display()));
                }
                Ok(output.into())
            }
            WorkspaceCommands::RemoveProject { name } => {
                let mut workspace = self.active_workspace()?;
                workspace.remove_project(name)?;
                self.workspaces.save(&workspace)?;
                Ok(format!("Removed project {} from workspace {}", name, workspace.name).into())
            }
            WorkspaceCommands::SelectProject { name } => {
                let mut workspace = self.active_workspace()?;
                workspace.set_active_project(name)?;
                self.workspaces.save(&workspace)?;
                Ok(format!("Active project: {}", name).into())
            }
            WorkspaceCommands::Set { key, value } => {
                let mut workspace = self.active_workspace()?;
                workspace.set_preference(key.as_str(), value.as_str());
                self.workspaces.save(&workspace)?;
                Ok(format!("{} = {}", key, value).into())
            }
            WorkspaceCommands::Export { path, name } => {
                let workspace = match name {
                    Some(name) => self.workspaces.load(name)?,
                    None => self.active_workspace()?,
                };
                let path = self.absolute(path);
                workspace.save_file(&path)?;
                Ok(format!("Exported workspace {} to {}", workspace.name, path.display()).into())
            }
            WorkspaceCommands::Import { path, force } => {
                let workspace = Workspace::load_file(&self.absolute(path))?;
                if self.workspaces.exists(&workspace.name)? && !*force {
                    return Err(StorageError::AlreadyExists(format!("workspace '{}'", workspace.name)).into());
                }
                self.workspaces.save(&workspace)?;
                Ok(format!("Imported workspace {}", workspace.name).into())
            }
        }
    }

    /// The active workspace for editing. A broken or missing record is
    /// replaced by the default workspace of the same name.
    fn active_workspace(&self) -> Result<Workspace, ApiError> {
        let active = self.workspaces.active()?;
        let (mut workspace, _) = self.workspaces.load_or_default(&active);
        workspace.name = active;
        Ok(workspace)
    }

    /// Find a project by name in the active workspace, else by file path.
    fn resolve_project(&self, spec: &str) -> Result<PathBuf, ApiError> {
        let (workspace, _) = self.workspaces.load_active()?;
        if let Some(project) = workspace.project(spec) {
            return Ok(self.absolute(&project.path));
        }
        let path = self.absolute(Path::new(spec));
        if path.is_file() {
            Ok(path)
        } else {
            Err(ApiError::ProjectNotFound(spec.to_string()))
        }
    }

    fn load_project(&self, spec: &str) -> Result<(PathBuf, LoadedProject), ApiError> {
        let path = self.resolve_project(spec)?;
        let loaded = self.open_project(&path)?;
        Ok((path, loaded))
    }

    fn open_project(&self, path: &Path) -> Result<LoadedProject, ApiError> {
        let LoadedProject { project, skipped } =
            project_file::load(path, Arc::clone(&self.registries.nodes))?;
        Ok(LoadedProject {
            project: project.with_history_depth(self.config.executor.history_depth),
            skipped,
        })
    }

    /// Write the project back after a run. A project loaded with skipped
    /// subtrees is never written.
    fn save_after_run(
        &self,
        path: &Path,
        project: &Project,
        success: bool,
        skipped: usize,
    ) -> Result<String, ApiError> {
        if !success {
            return Ok(format!("not saved: {}", path.display()));
        }
        if skipped > 0 {
            warn!(path = %path.display(), skipped, "Refusing to save a partially loaded project");
            return Ok(format!(
                "not saved: {}: {} unreadable subtree(s) would be lost",
                path.display(),
                skipped
            ));
        }
        project_file::save(path, project)?;
        Ok(format!("saved {}", path.display()))
    }

    fn record(&self, summary: &RunSummary) -> Result<(), ApiError> {
        for report in &summary.reports {
            self.runs.append(&RunRecord::from(report))?;
        }
        self.runs.flush()?;
        Ok(())
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

fn skipped_lines(loaded: &LoadedProject) -> Vec<String> {
    loaded
        .skipped
        .iter()
        .map(|err| format!("WARNING: skipped {}", err))
        .collect()
}

/// Process name as shown in errors; default-group names stay bare.
fn qualified(group: &str, name: &str) -> String {
    if group == DEFAULT_GROUP {
        name.to_string()
    } else {
        format!("{}/{}", group, name)
    }
}

fn drain_lines(rx: &Receiver<ProcessEvent>) -> Vec<String> {
    rx.try_iter().filter_map(|event| format_event(&event)).collect()
}
