// tests/cancellation.rs
#![cfg(target_os = "linux")]

use setup_runner_test_utils::builders::TaskBuilder;
use setup_runner_test_utils::scripts::write_script;
use setup_runner_test_utils::{init_tracing, with_timeout};

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tokio::time::{Duration, Instant, sleep};

use setup_runner::exec::ProcessExecutor;
use setup_runner::log::{LogLevel, LogService, NullSink};
use setup_runner::runner::{CancellationController, RunState, TaskRunner};
use setup_runner::task::EXIT_CANCELLED;
use setup_runner::types::Interpreter;

type TestResult = Result<(), Box<dyn Error>>;

fn memory_log() -> Arc<LogService> {
    Arc::new(LogService::with_sink(Box::new(NullSink), LogLevel::Verbose, 1_000))
}

/// Running and not a zombie.
fn is_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => {
            // State is the first field after the parenthesised command name.
            let state = stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next());
            !matches!(state, Some("Z") | Some("X"))
        }
        Err(_) => false,
    }
}

async fn wait_for_file(path: &Path) -> String {
    loop {
        if let Ok(contents) = std::fs::read_to_string(path) {
            if contents.ends_with('\n') {
                return contents;
            }
        }
        sleep(Duration::from_millis(20)).await;
    }
}

async fn gone_within(pid: u32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    !is_alive(pid)
}

#[tokio::test]
async fn cancel_kills_the_whole_process_tree() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let pids = dir.path().join("pids");
    let script = write_script(
        dir.path(),
        "tree.sh",
        &format!(
            "sleep 30 &\necho \"$$ $!\" > '{}'\necho started\nsleep 30",
            pids.display()
        ),
    );
    let task = TaskBuilder::new("Tree").key("tree").script(script).build();
    let log = memory_log();
    let executor = ProcessExecutor::new(log.clone()).with_interpreter(Interpreter::Sh);
    let controller = CancellationController::new();

    let token = controller.token();
    let run = tokio::spawn(async move { executor.execute(&task, &token).await });

    let contents = with_timeout(wait_for_file(&pids)).await;
    let recorded: Vec<u32> = contents
        .split_whitespace()
        .map(|p| p.parse())
        .collect::<Result<_, _>>()?;
    assert_eq!(recorded.len(), 2);
    for pid in &recorded {
        assert!(is_alive(*pid), "pid {pid} should be running before cancel");
    }

    controller.cancel();
    let result = with_timeout(run).await??;
    assert!(result.aborted);
    assert_eq!(result.exit_code, EXIT_CANCELLED);

    for pid in recorded {
        assert!(
            gone_within(pid, Duration::from_secs(5)).await,
            "pid {pid} survived cancellation"
        );
    }

    assert!(
        log.history()
            .iter()
            .any(|m| m.level == LogLevel::Warning && m.text.contains("forcibly terminated"))
    );
    Ok(())
}

#[tokio::test]
async fn runner_cancel_with_real_processes_never_fails() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("first-started");
    let first = write_script(
        dir.path(),
        "first.sh",
        &format!("echo up > '{}'\nsleep 30", marker.display()),
    );
    let second = write_script(dir.path(), "second.sh", "echo second-ran");
    let tasks = vec![
        TaskBuilder::new("First").key("first").script(first).build(),
        TaskBuilder::new("Second").key("second").script(second).build(),
    ];

    let log = memory_log();
    let executor = ProcessExecutor::new(log.clone()).with_interpreter(Interpreter::Sh);
    let controller = CancellationController::new();
    let handle = TaskRunner::new(tasks, executor, log.clone(), controller.token()).spawn();

    with_timeout(wait_for_file(&marker)).await;
    let cancelled_at = Instant::now();
    controller.cancel();

    let report = with_timeout(handle.join()).await;
    assert_eq!(report.state, RunState::Cancelled);
    assert!(cancelled_at.elapsed() < Duration::from_secs(5));
    assert_eq!(report.started_keys(), vec!["first"]);
    assert!(!log.history().iter().any(|m| m.text == "second-ran"));
    Ok(())
}

// The interpreter exits right away; a background job keeps stderr open, so
// the executor is still draining output when cancellation arrives.
const LINGERING_STDERR: &str = "(exec >/dev/null; sleep 30) &\necho done";

async fn wait_for_line(log: &LogService, tag: &str, text: &str) {
    while !log.history().iter().any(|m| m.tag == tag && m.text == text) {
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn cancel_while_draining_output_reports_already_exited() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "linger.sh", LINGERING_STDERR);
    let task = TaskBuilder::new("Linger").key("linger").script(script).build();
    let log = memory_log();
    let executor = ProcessExecutor::new(log.clone()).with_interpreter(Interpreter::Sh);
    let controller = CancellationController::new();

    let token = controller.token();
    let run = tokio::spawn(async move { executor.execute(&task, &token).await });

    with_timeout(wait_for_line(&log, "linger", "done")).await;
    // Let the interpreter exit and be reaped.
    sleep(Duration::from_millis(500)).await;
    controller.cancel();

    let result = with_timeout(run).await??;
    assert!(result.aborted);
    assert_eq!(result.exit_code, EXIT_CANCELLED);

    let entries: Vec<_> = log.history().into_iter().filter(|m| m.tag == "linger").collect();
    let exited: Vec<_> = entries
        .iter()
        .filter(|m| m.text.contains("had already exited"))
        .collect();
    assert_eq!(exited.len(), 1);
    assert_eq!(exited[0].level, LogLevel::Info);
    assert!(
        !entries
            .iter()
            .any(|m| matches!(m.level, LogLevel::Warning | LogLevel::Error)),
        "{entries:?}"
    );
    Ok(())
}

#[tokio::test]
async fn runner_cancel_while_draining_output_ends_cancelled() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "linger.sh", LINGERING_STDERR);
    let after = write_script(dir.path(), "after.sh", "echo after-ran");
    let tasks = vec![
        TaskBuilder::new("Linger").key("linger").script(script).build(),
        TaskBuilder::new("After").key("after").script(after).build(),
    ];

    let log = memory_log();
    let executor = ProcessExecutor::new(log.clone()).with_interpreter(Interpreter::Sh);
    let controller = CancellationController::new();
    let handle = TaskRunner::new(tasks, executor, log.clone(), controller.token()).spawn();

    with_timeout(wait_for_line(&log, "linger", "done")).await;
    sleep(Duration::from_millis(500)).await;
    controller.cancel();

    let report = with_timeout(handle.join()).await;
    assert_eq!(report.state, RunState::Cancelled, "{}", report.status);
    assert_eq!(report.started_keys(), vec!["linger"]);
    assert!(!log.history().iter().any(|m| m.text == "after-ran"));
    Ok(())
}
