//! FIFO process queue and per-project execution.

use crate::error::ProcessError;
use crate::process::calculator::{Calculator, CalculatorRegistry, TaskContext};
use crate::process::events::{EventBus, ProcessEvent};
use crate::process::{Process, ProcessStatus, Step};
use crate::project::Project;
use crate::types::{NodeId, ProcessId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Shared cancellation flag for one queued process.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Returned by [`ProcessExecutor::submit`].
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    id: ProcessId,
    name: String,
    cancel: CancelToken,
}

impl ProcessHandle {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request cancellation. A queued process is aborted without running; a
    /// running one stops at its next cancellation check and rolls back.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Outcome of one top-level process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub id: ProcessId,
    pub name: String,
    pub project: String,
    pub status: ProcessStatus,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    /// Sequence number of the committed memento, if the run changed anything.
    pub memento: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Reports for every process a [`ProcessExecutor::run`] drained, in queue
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub reports: Vec<ProcessReport>,
}

impl RunSummary {
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn count(&self, status: ProcessStatus) -> usize {
        self.reports.iter().filter(|r| r.status == status).count()
    }

    /// True when no process failed or was aborted.
    pub fn all_succeeded(&self) -> bool {
        self.reports.iter().all(|r| r.status.is_success())
    }

    pub fn report(&self, name: &str) -> Option<&ProcessReport> {
        self.reports.iter().find(|r| r.name == name)
    }
}

struct Queued {
    process: Process,
    cancel: CancelToken,
}

/// Runs submitted processes, oldest first, one transaction at a time.
pub struct ProcessExecutor {
    calculators: Arc<CalculatorRegistry>,
    queue: VecDeque<Queued>,
    events: EventBus,
}

impl ProcessExecutor {
    pub fn new(calculators: Arc<CalculatorRegistry>) -> Self {
        Self::with_events(calculators, EventBus::disabled())
    }

    pub fn with_events(calculators: Arc<CalculatorRegistry>, events: EventBus) -> Self {
        Self {
            calculators,
            queue: VecDeque::new(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Append `process` to the run queue.
    pub fn submit(&mut self, process: Process) -> ProcessHandle {
        let cancel = CancelToken::new();
        let handle = ProcessHandle {
            id: process.id(),
            name: process.name().to_string(),
            cancel: cancel.clone(),
        };
        debug!(process = %handle.id, name = %handle.name, "Process queued");
        self.events.emit(ProcessEvent::Queued {
            id: handle.id,
            name: handle.name.clone(),
        });
        self.queue.push_back(Queued { process, cancel });
        handle
    }

    /// Drain the queue against `project`.
    ///
    /// A failing or aborted process is rolled back and reported; the processes
    /// queued after it still run.
    #[instrument(skip_all, fields(project = %project.name(), queued = self.queue.len()))]
    pub fn run(&mut self, project: &mut Project) -> RunSummary {
        let mut summary = RunSummary::default();
        while let Some(queued) = self.queue.pop_front() {
            let report = self.run_one(project, queued);
            summary.reports.push(report);
        }
        info!(
            finished = summary.count(ProcessStatus::Finished),
            warnings = summary.count(ProcessStatus::FinishedWithWarning),
            failed = summary.count(ProcessStatus::Failed),
            aborted = summary.count(ProcessStatus::Aborted),
            "Run queue drained"
        );
        summary
    }

    fn run_one(&self, project: &mut Project, queued: Queued) -> ProcessReport {
        let Queued {
            mut process,
            cancel,
        } = queued;
        let started_at = Utc::now();
        let mut report = ProcessReport {
            id: process.id(),
            name: process.name().to_string(),
            project: project.name().to_string(),
            status: ProcessStatus::Running,
            warnings: Vec::new(),
            error: None,
            memento: None,
            started_at,
            finished_at: started_at,
        };

        if cancel.is_cancelled() {
            info!(process = %report.name, "Process cancelled before start");
            return self.finish(report, ProcessStatus::Aborted, Some("cancelled before start".into()));
        }

        if let Err(err) = project.begin(process.name()) {
            error!(process = %report.name, error = %err, "Cannot open transaction");
            return self.finish(report, ProcessStatus::Failed, Some(err.to_string()));
        }

        info!(process = %report.name, "Process started");
        self.events.emit(ProcessEvent::Started {
            id: report.id,
            name: report.name.clone(),
            project: report.project.clone(),
        });

        let root = project.root_id();
        let outcome = {
            let mut run = RunState {
                process_id: report.id,
                cancel: &cancel,
                warnings: &mut report.warnings,
            };
            self.execute(project, &mut process, root, &mut run)
        };

        match outcome {
            Ok(()) => match project.commit() {
                Ok(seq) => {
                    report.memento = seq;
                    let status = if report.warnings.is_empty() {
                        ProcessStatus::Finished
                    } else {
                        ProcessStatus::FinishedWithWarning
                    };
                    info!(process = %report.name, status = %status, "Process finished");
                    self.finish(report, status, None)
                }
                Err(err) => {
                    error!(process = %report.name, error = %err, "Commit failed");
                    self.finish(report, ProcessStatus::Failed, Some(err.to_string()))
                }
            },
            Err(err) => {
                let status = match err {
                    ProcessError::Cancelled => ProcessStatus::Aborted,
                    _ => ProcessStatus::Failed,
                };
                let mut reason = err.to_string();
                if status == ProcessStatus::Failed {
                    warn!(process = %report.name, reason = %reason, "Process failed, rolling back");
                } else {
                    info!(process = %report.name, "Process aborted, rolling back");
                }
                if let Err(rollback_err) = project.rollback() {
                    error!(process = %report.name, error = %rollback_err, "Rollback failed");
                    reason = format!("{}; rollback failed: {}", reason, rollback_err);
                }
                self.finish(report, status, Some(reason))
            }
        }
    }

    fn finish(&self, mut report: ProcessReport, status: ProcessStatus, reason: Option<String>) -> ProcessReport {
        report.status = status;
        report.error = reason;
        report.finished_at = Utc::now();
        self.events.emit(ProcessEvent::Finished {
            id: report.id,
            name: report.name.clone(),
            status,
            reason: report.error.clone(),
        });
        report
    }

    /// Run `process`'s steps in order inside the already open transaction.
    fn execute(
        &self,
        project: &mut Project,
        process: &mut Process,
        inherited: NodeId,
        run: &mut RunState<'_>,
    ) -> Result<(), ProcessError> {
        let target = process.target.resolve(project.tree(), inherited)?;

        for step in process.steps.iter_mut() {
            if run.cancel.is_cancelled() {
                return Err(ProcessError::Cancelled);
            }
            if step.is_skipped() {
                debug!(step = %step.name(), "Step skipped");
                continue;
            }
            self.events.emit(ProcessEvent::StepStarted {
                id: run.process_id,
                step: step.name().to_string(),
            });

            match step {
                Step::Calculator {
                    name, calculator, ..
                } => {
                    self.run_calculator(project, name.as_str(), calculator.as_mut(), target, run)?;
                }
                Step::Deferred {
                    name,
                    type_id,
                    parameters,
                    ..
                } => {
                    let mut calculator = self.calculators.create(type_id.as_str())?;
                    calculator
                        .configure(parameters)
                        .map_err(|source| ProcessError::Calculator {
                            step: name.clone(),
                            source,
                        })?;
                    self.run_calculator(project, name.as_str(), calculator.as_mut(), target, run)?;
                }
                Step::Process(child) => {
                    self.execute(project, child, target, run)?;
                }
            }
        }

        if run.cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }
        Ok(())
    }

    fn run_calculator(
        &self,
        project: &mut Project,
        step: &str,
        calculator: &mut dyn Calculator,
        target: NodeId,
        run: &mut RunState<'_>,
    ) -> Result<(), ProcessError> {
        debug!(step, target = %target, "Running calculator");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = TaskContext {
                project: &mut *project,
                target,
                process: run.process_id,
                step,
                warnings: &mut *run.warnings,
                events: &self.events,
                cancel: run.cancel,
            };
            calculator.run(&mut ctx)
        }));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => match err.downcast::<ProcessError>() {
                Ok(ProcessError::Cancelled) => Err(ProcessError::Cancelled),
                Ok(other) => Err(ProcessError::Calculator {
                    step: step.to_string(),
                    source: other.into(),
                }),
                Err(source) => Err(ProcessError::Calculator {
                    step: step.to_string(),
                    source,
                }),
            },
            Err(payload) => Err(ProcessError::Panicked {
                step: step.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

struct RunState<'a> {
    process_id: ProcessId,
    cancel: &'a CancelToken,
    warnings: &'a mut Vec<String>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
