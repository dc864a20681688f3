//! Process lifecycle events.
//!
//! The executor publishes events on a channel; presentation layers drain the
//! receiving end. Every top-level process produces exactly one `Finished`
//! event, and the stream ends once every sender has been dropped.

use crate::process::ProcessStatus;
use crate::types::ProcessId;
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcessEvent {
    Queued {
        id: ProcessId,
        name: String,
    },
    Started {
        id: ProcessId,
        name: String,
        project: String,
    },
    StepStarted {
        id: ProcessId,
        step: String,
    },
    Progress {
        id: ProcessId,
        step: String,
        fraction: f64,
        message: String,
    },
    Warning {
        id: ProcessId,
        step: String,
        message: String,
    },
    Finished {
        id: ProcessId,
        name: String,
        status: ProcessStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl ProcessEvent {
    pub fn process_id(&self) -> ProcessId {
        match self {
            ProcessEvent::Queued { id, .. }
            | ProcessEvent::Started { id, .. }
            | ProcessEvent::StepStarted { id, .. }
            | ProcessEvent::Progress { id, .. }
            | ProcessEvent::Warning { id, .. }
            | ProcessEvent::Finished { id, .. } => *id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessEvent::Finished { .. })
    }
}

/// Sending side of the event stream. Cloning shares the channel.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    tx: Option<Sender<ProcessEvent>>,
}

impl EventBus {
    pub fn new_pair() -> (Self, Receiver<ProcessEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Bus that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Publish `event`. A receiver that went away is not an error.
    pub fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                trace!("Process event dropped, receiver gone");
            }
        }
    }
}
