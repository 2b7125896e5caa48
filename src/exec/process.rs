// src/exec/process.rs

//! Runs one task script as a child process.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, SetupError};
use crate::exec::backend::ScriptExecutor;
use crate::exec::command::InvocationBuilder;
use crate::exec::terminate::{self, Termination};
use crate::log::{LogLevel, LogService};
use crate::task::{Task, TaskResult};
use crate::types::Interpreter;

/// How long trailing output of a killed process tree may take to drain.
const CANCEL_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Executes task scripts through the configured interpreter and streams
/// their output into the installer log.
///
/// stdout lines are logged at [`LogLevel::Info`], stderr lines at
/// [`LogLevel::Error`], both tagged with the task's identity key.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    log: Arc<LogService>,
    interpreter: Interpreter,
    preludes: Vec<PathBuf>,
}

impl ProcessExecutor {
    pub fn new(log: Arc<LogService>) -> Self {
        Self {
            log,
            interpreter: Interpreter::default(),
            preludes: Vec::new(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: Interpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Helper scripts sourced before every task script.
    pub fn with_preludes(mut self, preludes: Vec<PathBuf>) -> Self {
        self.preludes = preludes;
        self
    }

    pub fn interpreter(&self) -> Interpreter {
        self.interpreter
    }

    /// Run `task` and return its result once the process has exited and both
    /// output streams are drained.
    pub async fn execute(&self, task: &Task, token: &CancellationToken) -> Result<TaskResult> {
        let key = task.key().to_string();

        if !task.script.is_file() {
            self.log
                .error(&key, format!("Script not found: {}", task.script.display()));
            return Ok(TaskResult::script_missing());
        }

        let invocation = InvocationBuilder::new(self.interpreter)
            .with_preludes(&self.preludes)
            .with_task(task)
            .build()?;

        debug!(
            task = %key,
            program = %invocation.program,
            body = %invocation.script_body(),
            "spawning task script"
        );

        let mut cmd = invocation.to_command();
        terminate::prepare(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| SetupError::Spawn {
            task: key.clone(),
            source,
        })?;
        let pid = child.id();
        info!(task = %key, ?pid, script = %task.script.display(), "task process started");

        let mut readers = OutputReaders {
            stdout: Some(spawn_reader(child.stdout.take(), self.log.clone(), key.clone(), LogLevel::Info)),
            stderr: Some(spawn_reader(child.stderr.take(), self.log.clone(), key.clone(), LogLevel::Error)),
        };

        // Natural exit wins a tie with cancellation.
        let status = tokio::select! {
            biased;
            status = child.wait() => status?,
            _ = token.cancelled() => {
                return Ok(self.abort(task, &mut child, pid, readers).await);
            }
        };

        // A descendant that outlives the interpreter can keep the pipes open;
        // the drain stays cancellable.
        tokio::select! {
            biased;
            _ = readers.join() => {}
            _ = token.cancelled() => {
                return Ok(self.abort(task, &mut child, pid, readers).await);
            }
        }

        let code = exit_code(status);
        info!(task = %key, exit_code = code, success = status.success(), "task process exited");
        self.log.verbose(
            &key,
            format!("Script '{}' exited with code {code}", task.script_name()),
        );
        Ok(TaskResult::exited(code))
    }

    async fn abort(
        &self,
        task: &Task,
        child: &mut Child,
        pid: Option<u32>,
        mut readers: OutputReaders,
    ) -> TaskResult {
        let key = task.key();
        info!(task = %key, ?pid, "cancellation requested; terminating process tree");

        match terminate::terminate_tree(child, pid).await {
            Ok(Termination::Killed) => self.log.warn(
                key,
                format!("Script process forcibly terminated ({}).", task.script_name()),
            ),
            Ok(Termination::AlreadyExited) => self.log.info(
                key,
                format!(
                    "Script process had already exited when cancellation arrived ({}).",
                    task.script_name()
                ),
            ),
            Err(err) => {
                warn!(task = %key, error = %err, "failed to terminate process tree");
                self.log.error(key, format!("Failed to terminate script: {err}"));
            }
        }

        let drained = tokio::time::timeout(CANCEL_DRAIN_GRACE, readers.join()).await;
        if drained.is_err() {
            debug!(task = %key, "output readers still busy after termination; detaching");
            readers.abort();
        }

        TaskResult::cancelled()
    }
}

impl ScriptExecutor for ProcessExecutor {
    fn run_script<'a>(
        &'a self,
        task: &'a Task,
        token: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<TaskResult>> + Send + 'a>> {
        Box::pin(self.execute(task, token))
    }
}

/// Forward every line of `stream` into the log until the stream ends.
///
/// Bytes are decoded lossily so output in a legacy code page is still logged.
fn spawn_reader<R>(stream: Option<R>, log: Arc<LogService>, tag: String, level: LogLevel) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(stream) = stream else {
            return;
        };

        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    log.write(tag.as_str(), level, line.trim_end_matches(['\r', '\n']));
                }
                Err(err) => {
                    warn!(task = %tag, error = %err, "failed to read task output");
                    break;
                }
            }
        }
    })
}

/// Line readers of one child. A slot is emptied once its reader finished,
/// so `join` can be dropped mid-way and resumed later.
struct OutputReaders {
    stdout: Option<JoinHandle<()>>,
    stderr: Option<JoinHandle<()>>,
}

impl OutputReaders {
    async fn join(&mut self) {
        for slot in [&mut self.stdout, &mut self.stderr] {
            if let Some(handle) = slot.as_mut() {
                let _ = handle.await;
                *slot = None;
            }
        }
    }

    fn abort(&mut self) {
        for handle in self.stdout.take().into_iter().chain(self.stderr.take()) {
            handle.abort();
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
