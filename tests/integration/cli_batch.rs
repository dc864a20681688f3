//! Batch command execution through the run context

use clap::Parser;
use loom::cli::{Cli, CommandOutput, RunContext};
use loom::config::LoomConfig;
use loom::error::ApiError;
use loom::process::ProcessStatus;
use loom::tree::Node;
use loom::types::AttributeValue;
use loom::workspace::project_file;
use std::path::Path;
use tempfile::TempDir;

use crate::integration::test_utils::task;

fn context(dir: &TempDir) -> RunContext {
    let mut config = LoomConfig::default();
    config.system.data_dir = dir.path().join("data");
    RunContext::new(dir.path().to_path_buf(), config).unwrap()
}

fn exec(ctx: &RunContext, args: &[&str]) -> Result<CommandOutput, ApiError> {
    let mut argv = vec!["loom"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    ctx.execute(&cli.command)
}

/// Create `name.json` with a `Processes` container holding `tasks`.
fn project_with_tasks(ctx: &RunContext, dir: &TempDir, name: &str, tasks: Vec<Node>) {
    let file = format!("{}.json", name);
    exec(ctx, &["project", "new", &file]).unwrap();
    let path = dir.path().join(&file);
    let mut loaded = project_file::load(&path, ctx.registries().nodes.clone()).unwrap();
    let container = loaded.project.tree().resolve_path("/Processes").unwrap();
    for task in tasks {
        loaded.project.append_child(container, task).unwrap();
    }
    project_file::save(&path, &loaded.project).unwrap();
}

fn set_units(value: &str) -> Node {
    task(
        "set units",
        vec![Node::new("SetAttribute", "units")
            .with_attribute("key", "units")
            .with_attribute("value", value)],
    )
}

fn broken() -> Node {
    task(
        "broken",
        vec![
            Node::new("SetAttribute", "touch")
                .with_attribute("key", "touched")
                .with_attribute("value", true),
            Node::new("Fail", "boom").with_attribute("message", "solver diverged"),
        ],
    )
}

fn root_attribute(ctx: &RunContext, path: &Path, key: &str) -> Option<AttributeValue> {
    let loaded = project_file::load(path, ctx.registries().nodes.clone()).unwrap();
    loaded.project.tree().root().attribute(key).cloned()
}

#[test]
fn run_reports_each_process_and_continues_after_failure() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    project_with_tasks(&ctx, &dir, "bridge", vec![broken(), set_units("SI")]);

    let output = exec(&ctx, &["run", "bridge.json", "broken", "set units"]).unwrap();
    assert!(!output.success);
    let lines: Vec<&str> = output.text.lines().collect();
    assert_eq!(lines[0], "executing broken");
    assert!(lines[1].starts_with("process broken failed: "));
    assert!(lines[1].contains("solver diverged"));
    assert_eq!(lines[2], "executing set units");
    assert_eq!(lines[3], "process set units finished");
    assert_eq!(lines.len(), 4);
}

#[test]
fn unknown_process_is_reported_before_anything_runs() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    project_with_tasks(&ctx, &dir, "bridge", vec![set_units("SI")]);

    let err = exec(&ctx, &["run", "bridge.json", "set units", "X"]).unwrap_err();
    assert!(matches!(err, ApiError::ProcessNotFound(ref name) if name == "X"));
    assert_eq!(err.to_string(), "X not found");
    assert!(ctx.run_log().is_empty());
}

#[test]
fn save_writes_back_only_successful_runs() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let path = dir.path().join("bridge.json");
    project_with_tasks(&ctx, &dir, "bridge", vec![broken(), set_units("SI")]);

    let output = exec(&ctx, &["run", "bridge.json", "set units", "--save"]).unwrap();
    assert!(output.success);
    assert!(output.text.ends_with(&format!("saved {}", path.display())));
    assert_eq!(root_attribute(&ctx, &path, "units"), Some(AttributeValue::from("SI")));

    let output = exec(&ctx, &["run", "bridge.json", "broken", "--save"]).unwrap();
    assert!(!output.success);
    assert!(output.text.ends_with(&format!("not saved: {}", path.display())));
    assert_eq!(root_attribute(&ctx, &path, "touched"), None);
}

#[test]
fn task_groups_are_listed_and_run_by_name() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let path = dir.path().join("bridge.json");
    let checks = Node::new("TaskGroup", "checks").with_child(set_units("imperial"));
    project_with_tasks(&ctx, &dir, "bridge", vec![set_units("SI"), checks]);

    let output = exec(&ctx, &["processes", "bridge.json"]).unwrap();
    let lines: Vec<&str> = output.text.lines().collect();
    assert_eq!(lines[1], "  checks:");
    assert_eq!(lines[2], "    set units");
    assert_eq!(lines[3], "  default:");
    assert_eq!(lines[4], "    set units");
    assert!(output.text.ends_with("Total: 2 process(es) in 2 group(s)"));

    let output = exec(&ctx, &["run", "bridge.json", "set units", "--group", "checks", "--save"]).unwrap();
    assert!(output.success);
    assert_eq!(root_attribute(&ctx, &path, "units"), Some(AttributeValue::from("imperial")));

    let err = exec(&ctx, &["run", "bridge.json", "set units", "--group", "nowhere"]).unwrap_err();
    assert_eq!(err.to_string(), "nowhere/set units not found");
}

#[test]
fn runs_are_recorded_in_order() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    project_with_tasks(&ctx, &dir, "bridge", vec![broken(), set_units("SI")]);
    exec(&ctx, &["run", "bridge.json", "broken", "set units"]).unwrap();

    let recent = ctx.run_log().recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    let statuses: Vec<(String, ProcessStatus)> = recent
        .iter()
        .map(|record| (record.process.clone(), record.status))
        .collect();
    assert!(statuses.contains(&("broken".to_string(), ProcessStatus::Failed)));
    assert!(statuses.contains(&("set units".to_string(), ProcessStatus::Finished)));
    assert!(recent.iter().all(|record| record.project == "bridge"));
}

#[test]
fn run_log_keeps_only_the_configured_number_of_runs() {
    let dir = TempDir::new().unwrap();
    let mut config = LoomConfig::default();
    config.system.data_dir = dir.path().join("data");
    config.system.run_log_limit = 2;
    let ctx = RunContext::new(dir.path().to_path_buf(), config).unwrap();
    project_with_tasks(&ctx, &dir, "bridge", vec![broken(), set_units("SI")]);

    exec(&ctx, &["run", "bridge.json", "broken", "set units", "broken"]).unwrap();
    assert_eq!(ctx.run_log().len(), 2);
    let recent: Vec<String> = ctx
        .run_log()
        .recent(10)
        .unwrap()
        .into_iter()
        .map(|record| record.process)
        .collect();
    assert_eq!(recent, vec!["broken", "set units"]);
}

#[test]
fn run_all_covers_every_workspace_project() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    project_with_tasks(&ctx, &dir, "north", vec![set_units("SI")]);
    project_with_tasks(&ctx, &dir, "south", vec![set_units("SI")]);
    exec(&ctx, &["workspace", "add-project", "north", "north.json"]).unwrap();
    exec(&ctx, &["workspace", "add-project", "south", "south.json"]).unwrap();

    let output = exec(&ctx, &["run-all", "set units", "--save"]).unwrap();
    assert!(output.success);
    assert!(output.text.contains("[north] process set units finished"));
    assert!(output.text.contains("[south] process set units finished"));
    for name in ["north", "south"] {
        let path = dir.path().join(format!("{}.json", name));
        assert_eq!(root_attribute(&ctx, &path, "units"), Some(AttributeValue::from("SI")));
    }
}

#[test]
fn workspace_projects_resolve_by_name() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    project_with_tasks(&ctx, &dir, "bridge", vec![set_units("SI")]);
    exec(&ctx, &["workspace", "new", "design"]).unwrap();
    exec(&ctx, &["workspace", "switch", "design"]).unwrap();
    exec(&ctx, &["workspace", "add-project", "main", "bridge.json"]).unwrap();

    let output = exec(&ctx, &["processes", "main"]).unwrap();
    assert!(output.text.contains("set units"));

    let err = exec(&ctx, &["processes", "nowhere"]).unwrap_err();
    assert!(matches!(err, ApiError::ProjectNotFound(_)));
}

#[test]
fn types_lists_core_registrations() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let output = exec(&ctx, &["types", "--format", "json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output.text).unwrap();
    let rendered = value.to_string();
    for type_id in ["Object", "Point", "SetAttribute", "Fail"] {
        assert!(rendered.contains(type_id), "missing {}", type_id);
    }
}

#[test]
fn save_refuses_to_drop_unreadable_subtrees() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let path = dir.path().join("bridge.json");
    project_with_tasks(&ctx, &dir, "bridge", vec![set_units("SI")]);

    let mut doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    doc["children"].as_array_mut().unwrap().push(serde_json::json!({
        "typeId": "Hologram",
        "id": loom::types::NodeId::new().to_string(),
        "name": "precious",
        "attributes": {},
        "children": []
    }));
    std::fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();

    let output = exec(&ctx, &["run", "bridge.json", "set units", "--save"]).unwrap();
    assert!(!output.success);
    assert!(output.text.contains("WARNING: skipped"));
    assert!(output.text.contains("process set units finished"));
    assert!(output.text.contains("unreadable subtree(s) would be lost"));

    let on_disk = std::fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains("Hologram"));
    assert!(on_disk.contains("precious"));
    let saved: serde_json::Value = serde_json::from_str(&on_disk).unwrap();
    assert!(saved["attributes"].get("units").is_none());
}
