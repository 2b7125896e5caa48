// src/runner/events.rs

//! Status and progress published by the runner.
//!
//! Events are emitted from the worker task; the consumer (terminal front end,
//! GUI, test) decides on which context to handle them.

use crate::task::TaskResult;

use super::RunState;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    StateChanged(RunState),
    /// Status line. `step` is 1-based while a task runs and equals the
    /// completed count otherwise.
    Status {
        step: usize,
        total: usize,
        label: String,
        text: String,
    },
    /// Completed fraction in `[0, 1]`.
    Progress(f64),
    Finished(RunReport),
}

/// What happened to one started task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub key: String,
    pub result: TaskResult,
}

/// Final outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub state: RunState,
    /// Final status line: outcome plus a one-line reason.
    pub status: String,
    pub reason: Option<String>,
    pub total: usize,
    pub completed: usize,
    pub progress: f64,
    /// Tasks that were started, in order.
    pub records: Vec<TaskRecord>,
}

impl RunReport {
    /// Report for a run whose worker died without producing one.
    pub fn unexpected_failure(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            state: RunState::Failed,
            status: format!("Installation failed: {reason}"),
            reason: Some(reason),
            total: 0,
            completed: 0,
            progress: 0.0,
            records: Vec::new(),
        }
    }

    pub fn started_keys(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.key.as_str()).collect()
    }
}
