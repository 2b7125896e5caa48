use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use setup_runner::errors::{Result, SetupError};
use setup_runner::exec::ScriptExecutor;
use setup_runner::task::{Task, TaskResult};

/// Scripted behaviour for one task key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Exit(i32),
    /// Report the script as missing without "spawning".
    MissingScript,
    /// Wait until cancelled, then report an aborted run.
    BlockUntilCancelled,
    /// Fail as if the interpreter could not be spawned.
    SpawnError,
    Panic,
}

/// A fake executor that:
/// - records which tasks were started, in order
/// - returns scripted results per task key (default: exit 0)
/// - optionally announces each start on a channel.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    behaviours: Arc<Mutex<HashMap<String, Behaviour>>>,
    started: Arc<Mutex<Vec<String>>>,
    notify: Option<mpsc::UnboundedSender<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, behaviour: Behaviour) -> Self {
        self.behaviours
            .lock()
            .unwrap()
            .insert(key.to_string(), behaviour);
        self
    }

    /// Receive each task key as it starts.
    pub fn start_notifications(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notify = Some(tx);
        rx
    }

    /// Shared handle to the list of started keys.
    pub fn started_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.started)
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

impl ScriptExecutor for FakeExecutor {
    fn run_script<'a>(
        &'a self,
        task: &'a Task,
        token: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<TaskResult>> + Send + 'a>> {
        Box::pin(async move {
            let key = task.key().to_string();
            let behaviour = self
                .behaviours
                .lock()
                .unwrap()
                .get(&key)
                .copied()
                .unwrap_or(Behaviour::Exit(0));

            if behaviour == Behaviour::MissingScript {
                return Ok(TaskResult::script_missing());
            }

            self.started.lock().unwrap().push(key.clone());
            if let Some(tx) = &self.notify {
                let _ = tx.send(key.clone());
            }

            match behaviour {
                Behaviour::Exit(code) => Ok(TaskResult::exited(code)),
                Behaviour::BlockUntilCancelled => {
                    token.cancelled().await;
                    Ok(TaskResult::cancelled())
                }
                Behaviour::SpawnError => Err(SetupError::Spawn {
                    task: key,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no interpreter"),
                }),
                Behaviour::Panic => panic!("fake executor panic in task '{key}'"),
                Behaviour::MissingScript => unreachable!(),
            }
        })
    }
}
