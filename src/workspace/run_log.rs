//! Record of top-level process runs, kept next to the workspaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use tracing::debug;

use crate::error::StorageError;
use crate::process::{ProcessReport, ProcessStatus};

const TREE_RUNS: &str = "runs";
/// Records kept when no limit is configured.
pub const DEFAULT_RUN_LOG_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub process: String,
    pub project: String,
    pub status: ProcessStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl From<&ProcessReport> for RunRecord {
    fn from(report: &ProcessReport) -> Self {
        Self {
            process: report.name.clone(),
            project: report.project.clone(),
            status: report.status,
            started_at: report.started_at,
            finished_at: report.finished_at,
            warnings: report.warnings.clone(),
            error: report.error.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RunLog {
    db: Db,
    runs: Tree,
    limit: usize,
}

impl RunLog {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        Self::with_limit(db, DEFAULT_RUN_LOG_LIMIT)
    }

    /// A log keeping at most `limit` records; the oldest go first.
    pub fn with_limit(db: Db, limit: usize) -> Result<Self, StorageError> {
        let runs = db.open_tree(TREE_RUNS)?;
        Ok(Self {
            db,
            runs,
            limit: limit.max(1),
        })
    }

    /// Append a record; keys are monotonically increasing ids.
    pub fn append(&self, record: &RunRecord) -> Result<u64, StorageError> {
        let id = self.db.generate_id()?;
        let value = bincode::serialize(record).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.runs.insert(id.to_be_bytes(), value)?;
        let mut dropped = 0usize;
        while self.runs.len() > self.limit && self.runs.pop_min()?.is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, limit = self.limit, "Trimmed run log");
        }
        Ok(id)
    }

    /// Most recent records first, at most `limit` of them.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunRecord>, StorageError> {
        let mut out = Vec::new();
        for result in self.runs.iter().rev().take(limit) {
            let (_, value) = result?;
            let record = bincode::deserialize(&value).map_err(|e| StorageError::Serialization(e.to_string()))?;
            out.push(record);
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}
