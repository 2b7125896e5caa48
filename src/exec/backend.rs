// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The task runner talks to a `ScriptExecutor` instead of spawning processes
//! itself. Production code uses [`ProcessExecutor`](super::ProcessExecutor);
//! tests can provide an implementation that records which tasks were started
//! and returns scripted results without touching the OS.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::task::{Task, TaskResult};

/// Runs one task to completion.
pub trait ScriptExecutor: Send + Sync {
    /// Run `task`, observing `token` for cancellation.
    ///
    /// Expected failures (missing script, non-zero exit, cancellation) are
    /// reported through the returned [`TaskResult`]; `Err` is reserved for
    /// failures to run the task at all, such as a spawn error.
    fn run_script<'a>(
        &'a self,
        task: &'a Task,
        token: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<TaskResult>> + Send + 'a>>;
}

impl<E: ScriptExecutor + ?Sized> ScriptExecutor for Arc<E> {
    fn run_script<'a>(
        &'a self,
        task: &'a Task,
        token: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<TaskResult>> + Send + 'a>> {
        (**self).run_script(task, token)
    }
}
