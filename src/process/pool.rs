//! Bounded worker pool running independent projects side by side.
//!
//! Each job pairs a project with the executor holding its queue. A job takes a
//! semaphore permit, then locks its project for the whole queue on a blocking
//! worker thread, so top-level processes never interleave within one project
//! while different projects proceed concurrently.

use crate::error::ProcessError;
use crate::process::executor::{ProcessExecutor, RunSummary};
use crate::project::Project;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// A project plus the queue to run against it.
pub struct ProjectJob {
    pub project: Arc<Mutex<Project>>,
    pub executor: ProcessExecutor,
}

impl ProjectJob {
    pub fn new(project: Arc<Mutex<Project>>, executor: ProcessExecutor) -> Self {
        Self { project, executor }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl WorkerPool {
    /// Pool running at most `max_workers` project queues at once (minimum 1).
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every job's queue; results come back in job order.
    pub async fn run_projects(&self, jobs: Vec<ProjectJob>) -> Vec<Result<RunSummary, ProcessError>> {
        info!(jobs = jobs.len(), max_workers = self.max_workers, "Running project queues");
        let tasks = jobs.into_iter().map(|job| {
            let permits = Arc::clone(&self.permits);
            async move {
                let permit = permits.acquire_owned().await.map_err(|e| ProcessError::Panicked {
                    step: "worker pool".to_string(),
                    message: e.to_string(),
                })?;
                let ProjectJob {
                    project,
                    mut executor,
                } = job;
                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let mut project = project.lock();
                    debug!(project = %project.name(), queued = executor.len(), "Worker picked up project");
                    executor.run(&mut project)
                });
                handle.await.map_err(|e| {
                    error!(error = %e, "Project worker crashed");
                    ProcessError::Panicked {
                        step: "worker".to_string(),
                        message: e.to_string(),
                    }
                })
            }
        });
        join_all(tasks).await
    }

    /// Blocking wrapper around [`run_projects`](Self::run_projects) that
    /// brings its own runtime.
    pub fn run_projects_blocking(&self, jobs: Vec<ProjectJob>) -> Result<Vec<Result<RunSummary, ProcessError>>, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.max_workers)
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.run_projects(jobs)))
    }
}
