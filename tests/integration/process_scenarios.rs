//! End-to-end process execution scenarios

use loom::process::{
    FnCalculator, Process, ProcessCatalog, ProcessEvent, ProcessExecutor, ProcessStatus,
    ProjectJob, TaskContext, WorkerPool, EventBus,
};
use loom::types::AttributeValue;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::integration::test_utils::{create_point, process_data, project, registries, task};
use loom::tree::Node;

/// "move P1" sets an attribute and then fails: the tree is untouched and
/// the undo stack still holds only "create P1".
#[test]
fn failing_process_leaves_tree_and_history_unchanged() {
    let registries = registries();
    let mut project = project(&registries, "bridge");
    let p1 = create_point(&mut project, "P1");
    let before = project.tree().to_json().unwrap();

    let mut executor = ProcessExecutor::new(registries.calculators.clone());
    executor.submit(
        Process::new("move P1")
            .target_node(p1)
            .step(
                "shift",
                FnCalculator::new(|ctx: &mut TaskContext<'_>| {
                    let target = ctx.target();
                    ctx.set_attribute(target, "x", 10.0)?;
                    Ok(())
                }),
            )
            .step(
                "explode",
                FnCalculator::new(|_ctx: &mut TaskContext<'_>| anyhow::bail!("mesh failure")),
            ),
    );
    let summary = executor.run(&mut project);

    let report = summary.report("move P1").unwrap();
    assert_eq!(report.status, ProcessStatus::Failed);
    assert!(report.error.as_deref().unwrap().contains("mesh failure"));
    assert_eq!(project.tree().to_json().unwrap(), before);
    assert_eq!(project.history().undo_labels(), vec!["create P1"]);
    assert!(!project.is_transaction_open());
}

#[test]
fn stored_process_runs_from_catalog() {
    let registries = registries();
    let mut project = project(&registries, "bridge");
    create_point(&mut project, "P1");
    let data = process_data(vec![task(
        "lift P1",
        vec![
            Node::new("SetAttribute", "raise")
                .with_attribute("node", "/P1")
                .with_attribute("key", "z")
                .with_attribute("value", 2.5),
            Node::new("Warn", "note").with_attribute("message", "check supports"),
        ],
    )]);
    let root = project.root_id();
    project.append_child(root, data).unwrap();

    let process = ProcessCatalog::find(project.tree(), "lift P1").unwrap();
    let (events, rx) = EventBus::new_pair();
    let mut executor = ProcessExecutor::with_events(registries.calculators.clone(), events);
    executor.submit(process);
    let summary = executor.run(&mut project);
    drop(executor);

    assert_eq!(summary.reports[0].status, ProcessStatus::FinishedWithWarning);
    assert_eq!(summary.reports[0].warnings, vec!["check supports".to_string()]);
    let p1 = project.tree().resolve_path("/P1").unwrap();
    assert_eq!(
        project.tree().get(p1).unwrap().attribute("z"),
        Some(&AttributeValue::Float(2.5))
    );
    assert_eq!(project.history().undo_labels(), vec!["lift P1", "create P1"]);

    let events: Vec<ProcessEvent> = rx.iter().collect();
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(matches!(events.first(), Some(ProcessEvent::Queued { .. })));
}

/// Two projects run side by side; each history only sees its own process.
#[test]
fn two_projects_run_concurrently_with_independent_histories() {
    let registries = registries();
    let tag = |value: &'static str| {
        Process::new(format!("tag {}", value)).step(
            "tag",
            FnCalculator::new(move |ctx: &mut TaskContext<'_>| {
                let target = ctx.target();
                ctx.set_attribute(target, "tag", value)?;
                Ok(())
            }),
        )
    };

    let alpha = Arc::new(Mutex::new(project(&registries, "alpha")));
    let beta = Arc::new(Mutex::new(project(&registries, "beta")));
    let mut alpha_exec = ProcessExecutor::new(registries.calculators.clone());
    alpha_exec.submit(tag("a"));
    let mut beta_exec = ProcessExecutor::new(registries.calculators.clone());
    beta_exec.submit(tag("b"));

    let pool = WorkerPool::new(2);
    let results = pool
        .run_projects_blocking(vec![
            ProjectJob::new(alpha.clone(), alpha_exec),
            ProjectJob::new(beta.clone(), beta_exec),
        ])
        .unwrap();

    for result in &results {
        let summary = result.as_ref().unwrap();
        assert_eq!(summary.reports[0].status, ProcessStatus::Finished);
    }
    assert_eq!(alpha.lock().history().undo_labels(), vec!["tag a"]);
    assert_eq!(beta.lock().history().undo_labels(), vec!["tag b"]);
}

/// A failed process does not stop the ones queued after it.
#[test]
fn queue_continues_after_failure() {
    let registries = registries();
    let mut project = project(&registries, "bridge");
    let mut executor = ProcessExecutor::new(registries.calculators.clone());
    let fail = Process::new("broken").deferred(
        "Fail",
        [("message".to_string(), AttributeValue::from("no mesh"))].into_iter().collect(),
    );
    let create = Process::new("add P2").deferred(
        "CreateChild",
        [
            ("type".to_string(), AttributeValue::from("Point")),
            ("name".to_string(), AttributeValue::from("P2")),
        ]
        .into_iter()
        .collect(),
    );
    executor.submit(fail);
    executor.submit(create);
    let summary = executor.run(&mut project);

    assert_eq!(summary.count(ProcessStatus::Failed), 1);
    assert_eq!(summary.count(ProcessStatus::Finished), 1);
    assert!(project.tree().resolve_path("/P2").is_some());
    assert_eq!(project.history().undo_labels(), vec!["add P2"]);
}

#[test]
fn cancelled_before_start_is_aborted() {
    let registries = registries();
    let mut project = project(&registries, "bridge");
    let mut executor = ProcessExecutor::new(registries.calculators.clone());
    let handle = executor.submit(Process::new("never"));
    handle.cancel();
    let summary = executor.run(&mut project);
    assert_eq!(summary.reports[0].status, ProcessStatus::Aborted);
    assert!(!project.can_undo());
}

/// A process that removes a node of a type the registry cannot rebuild and
/// then fails must still leave the tree exactly as it found it.
#[test]
fn failed_process_restores_unrebuildable_nodes() {
    let registries = registries();
    let ghost = Node::new("Ghost", "G");
    let ghost_id = ghost.id();
    let tree = loom::tree::ProjectTree::new(Node::new("Project", "bridge").with_child(ghost)).unwrap();
    let mut project = loom::project::Project::from_tree(tree, registries.nodes.clone());
    let before = project.tree().to_json().unwrap();

    let mut executor = ProcessExecutor::new(registries.calculators.clone());
    executor.submit(
        Process::new("purge")
            .step(
                "remove",
                FnCalculator::new(move |ctx: &mut TaskContext<'_>| {
                    ctx.remove(ghost_id)?;
                    Ok(())
                }),
            )
            .step(
                "fail",
                FnCalculator::new(|_ctx: &mut TaskContext<'_>| anyhow::bail!("boom")),
            ),
    );
    let report = executor.run(&mut project).reports.remove(0);

    assert_eq!(report.status, ProcessStatus::Failed);
    assert!(!report.error.as_deref().unwrap().contains("rollback failed"));
    assert_eq!(project.tree().to_json().unwrap(), before);
    assert!(!project.can_undo());
}

#[test]
fn inserting_an_unregistered_type_fails_the_process() {
    let registries = registries();
    let mut project = project(&registries, "bridge");
    let before = project.tree().to_json().unwrap();

    let mut executor = ProcessExecutor::new(registries.calculators.clone());
    executor.submit(Process::new("haunt").step(
        "add",
        FnCalculator::new(|ctx: &mut TaskContext<'_>| {
            let root = ctx.target();
            ctx.append_child(root, Node::new("Ghost", "G"))?;
            Ok(())
        }),
    ));
    let report = executor.run(&mut project).reports.remove(0);

    assert_eq!(report.status, ProcessStatus::Failed);
    assert!(report.error.as_deref().unwrap().contains("Ghost"));
    assert_eq!(project.tree().to_json().unwrap(), before);
}
