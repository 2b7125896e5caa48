// src/runner/mod.rs

//! Sequential task runner.
//!
//! [`TaskRunner`] walks the selected tasks in manifest order, hands each one
//! to a [`ScriptExecutor`] and stops at the first failure or cancellation.
//! It is the only place that decides the terminal [`RunState`]; everything
//! that goes wrong inside the loop ends up in the [`RunReport`].

pub mod cancel;
pub mod events;
pub mod state;

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::exec::ScriptExecutor;
use crate::log::{LogLevel, LogService};
use crate::task::{SelectionSet, Task};
use crate::types::MissingScriptPolicy;

pub use cancel::CancellationController;
pub use events::{RunEvent, RunReport, TaskRecord};
pub use state::RunState;

/// Tag used for runner entries in the installer log.
pub const RUNNER_TAG: &str = "runner";

/// How the task loop ended.
#[derive(Debug)]
enum LoopEnd {
    Completed,
    Failed(String),
    Cancelled(String),
}

/// Runs the selected tasks one after another.
pub struct TaskRunner<E: ScriptExecutor> {
    tasks: Arc<[Task]>,
    selection: SelectionSet,
    missing_script: MissingScriptPolicy,
    executor: E,
    log: Arc<LogService>,
    token: CancellationToken,
    events: Option<mpsc::UnboundedSender<RunEvent>>,

    state: RunState,
    total: usize,
    completed: usize,
    records: Vec<TaskRecord>,
}

impl<E: ScriptExecutor> fmt::Debug for TaskRunner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("tasks", &self.tasks.len())
            .field("selection", &self.selection)
            .field("missing_script", &self.missing_script)
            .field("state", &self.state)
            .field("completed", &self.completed)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl<E: ScriptExecutor> TaskRunner<E> {
    pub fn new(
        tasks: impl Into<Arc<[Task]>>,
        executor: E,
        log: Arc<LogService>,
        token: CancellationToken,
    ) -> Self {
        Self {
            tasks: tasks.into(),
            selection: SelectionSet::all(),
            missing_script: MissingScriptPolicy::default(),
            executor,
            log,
            token,
            events: None,
            state: RunState::Idle,
            total: 0,
            completed: 0,
            records: Vec::new(),
        }
    }

    /// Restrict the run to these identity keys. Empty means all tasks.
    pub fn with_selection(mut self, selection: SelectionSet) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_missing_script_policy(mut self, policy: MissingScriptPolicy) -> Self {
        self.missing_script = policy;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run to a terminal state on the current task.
    ///
    /// Never returns an error: failures and cancellation are described by the
    /// returned report.
    pub async fn run(mut self) -> RunReport {
        let outcome = match self.transition(RunState::Running) {
            Ok(()) => self.run_tasks().await,
            Err(err) => Err(err),
        };

        let end = match outcome {
            Ok(end) => end,
            Err(err) => {
                error!(error = ?err, "task loop aborted by an unexpected error");
                self.log
                    .error(RUNNER_TAG, format!("Unexpected error: {err}"));
                LoopEnd::Failed(err.to_string())
            }
        };

        self.finish(end)
    }

    /// Run on a background tokio task.
    pub fn spawn(self) -> RunHandle
    where
        E: 'static,
    {
        let log = self.log.clone();
        let events = self.events.clone();
        let handle = tokio::spawn(self.run());
        RunHandle {
            handle,
            log,
            events,
        }
    }

    async fn run_tasks(&mut self) -> Result<LoopEnd> {
        let tasks = Arc::clone(&self.tasks);
        let effective = self.selection.resolve(&tasks);
        self.total = effective.len();

        for key in self.selection.unmatched(&tasks) {
            self.log.warn(
                RUNNER_TAG,
                format!("Selected package '{key}' does not match any task."),
            );
        }

        self.log
            .verbose(RUNNER_TAG, format!("Tasks to execute: {}", self.total));
        let selected = if self.selection.is_empty() {
            "all".to_string()
        } else {
            self.selection.keys().collect::<Vec<_>>().join(", ")
        };
        self.log
            .info(RUNNER_TAG, format!("Selected packages: {selected}"));
        info!(total = self.total, selection = %selected, "task run started");

        if self.total == 0 {
            self.log
                .warn(RUNNER_TAG, "No tasks selected; nothing to install.");
        }

        for (index, task) in effective.into_iter().enumerate() {
            let step = index + 1;
            let key = task.key().to_string();

            if self.token.is_cancelled() {
                return Ok(LoopEnd::Cancelled(format!(
                    "cancelled before step {step}/{} ({key})",
                    self.total
                )));
            }

            let label = task.display_label().to_string();
            self.status(step, &label, format!("Step {step}/{}: {label}", self.total));
            self.log.info(&key, format!("=== {label} ==="));
            debug!(task = %key, step, total = self.total, "starting task");

            let result = self.executor.run_script(task, &self.token).await?;
            self.records.push(TaskRecord {
                key: key.clone(),
                result,
            });

            if result.is_cancelled() {
                return Ok(LoopEnd::Cancelled(format!("cancelled during '{key}'")));
            }

            if result.is_script_missing() && self.missing_script == MissingScriptPolicy::Skip {
                self.log.warn(
                    RUNNER_TAG,
                    format!("Script for '{key}' is missing; skipping step."),
                );
                self.step_done();
                continue;
            }

            if !result.is_success() {
                self.log.error(
                    RUNNER_TAG,
                    format!("Step '{key}' failed with exit code {}.", result.exit_code),
                );
                self.status(step, &label, format!("Step failed: {key}"));
                warn!(task = %key, exit_code = result.exit_code, "task failed; aborting run");
                return Ok(LoopEnd::Failed(format!(
                    "step '{key}' failed with exit code {}",
                    result.exit_code
                )));
            }

            self.log
                .verbose(RUNNER_TAG, format!("Step completed successfully: {key}"));
            self.step_done();
        }

        Ok(LoopEnd::Completed)
    }

    fn finish(mut self, end: LoopEnd) -> RunReport {
        let (state, reason, status) = match end {
            LoopEnd::Completed => {
                self.log
                    .success(RUNNER_TAG, "All tasks completed successfully.");
                self.log.write(
                    RUNNER_TAG,
                    LogLevel::Docs,
                    "Restart your terminal so updated environment variables take effect.",
                );
                let status = format!(
                    "All tasks completed successfully ({}/{} steps).",
                    self.completed, self.total
                );
                (RunState::Completed, None, status)
            }
            LoopEnd::Failed(reason) => {
                self.log.error(RUNNER_TAG, "Installation failed.");
                let status = format!("Installation failed: {reason}.");
                (RunState::Failed, Some(reason), status)
            }
            LoopEnd::Cancelled(reason) => {
                self.log
                    .warn(RUNNER_TAG, "Installation cancelled by user.");
                let status = format!("Installation cancelled by user: {reason}.");
                (RunState::Cancelled, Some(reason), status)
            }
        };

        if state == RunState::Completed {
            self.emit(RunEvent::Progress(1.0));
        }
        let label = String::new();
        self.status(self.completed, &label, status.clone());

        if let Err(err) = self.transition(state) {
            // Only reachable if the runner never left Idle.
            error!(error = %err, "could not record terminal state");
        }

        let report = RunReport {
            state,
            status,
            reason,
            total: self.total,
            completed: self.completed,
            progress: if state == RunState::Completed {
                1.0
            } else {
                self.progress()
            },
            records: std::mem::take(&mut self.records),
        };

        info!(
            state = ?report.state,
            completed = report.completed,
            total = report.total,
            "task run finished"
        );
        self.emit(RunEvent::Finished(report.clone()));
        report
    }

    fn transition(&mut self, next: RunState) -> Result<()> {
        self.state.advance(next)?;
        self.emit(RunEvent::StateChanged(next));
        Ok(())
    }

    fn step_done(&mut self) {
        self.completed += 1;
        self.emit(RunEvent::Progress(self.progress()));
    }

    fn progress(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    fn status(&self, step: usize, label: &str, text: String) {
        self.log.verbose(RUNNER_TAG, format!("Status: {text}"));
        self.emit(RunEvent::Status {
            step,
            total: self.total,
            label: label.to_string(),
            text,
        });
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            // A consumer that went away does not stop the run.
            let _ = tx.send(event);
        }
    }
}

/// Handle to a runner started with [`TaskRunner::spawn`].
#[derive(Debug)]
pub struct RunHandle {
    handle: JoinHandle<RunReport>,
    log: Arc<LogService>,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl RunHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the terminal report. A panicking worker yields a `Failed`
    /// report instead of propagating the panic.
    pub async fn join(self) -> RunReport {
        match self.handle.await {
            Ok(report) => report,
            Err(err) => {
                let reason = if err.is_panic() {
                    "task runner panicked"
                } else {
                    "task runner was aborted"
                };
                error!(error = %err, "{reason}");
                self.log
                    .error(RUNNER_TAG, format!("Unexpected error: {reason}."));

                let report = RunReport::unexpected_failure(reason);
                if let Some(tx) = &self.events {
                    let _ = tx.send(RunEvent::StateChanged(RunState::Failed));
                    let _ = tx.send(RunEvent::Finished(report.clone()));
                }
                report
            }
        }
    }
}
