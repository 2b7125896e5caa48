// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running task scripts, using
//! `tokio::process::Command`, and reporting a [`TaskResult`] back to the
//! task runner.
//!
//! - [`command`] builds the quoted interpreter invocation.
//! - [`process`] spawns the interpreter, streams its output into the
//!   installer log and waits for it under cancellation.
//! - [`terminate`] kills a whole process tree.
//! - [`backend`] provides the `ScriptExecutor` trait, implemented by
//!   `ProcessExecutor` in production and by fakes in tests.
//!
//! [`TaskResult`]: crate::task::TaskResult

pub mod backend;
pub mod command;
pub mod process;
pub mod terminate;

pub use backend::ScriptExecutor;
pub use command::{Invocation, InvocationBuilder};
pub use process::ProcessExecutor;
