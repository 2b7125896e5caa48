// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod log;
pub mod logging;
pub mod runner;
pub mod task;
pub mod types;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{Manifest, load_and_validate};
use crate::exec::ProcessExecutor;
use crate::log::{LogLevel, LogService, LogSubscription};
use crate::runner::{CancellationController, RunEvent, RunReport, TaskRunner};
use crate::task::SelectionSet;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading
/// - the installer log and its terminal printer
/// - the process executor and task runner
/// - Ctrl-C handling
///
/// Returns `None` for `--list` and `--dry-run`, which run nothing.
pub async fn run(args: CliArgs) -> Result<Option<RunReport>> {
    let manifest_path = PathBuf::from(&args.config);
    let manifest = load_and_validate(&manifest_path)
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;

    if args.list {
        print_task_list(&manifest);
        return Ok(None);
    }

    let selection = args
        .selection()
        .unwrap_or_else(|| manifest.default_selection());
    let policy = args
        .missing_script
        .unwrap_or(manifest.installer().missing_script);

    if args.dry_run {
        print_dry_run(&manifest, &selection, policy);
        return Ok(None);
    }

    let mut log_config = manifest.log_config();
    if let Some(level) = args.log_level {
        log_config.level = level;
    }
    let log = LogService::init_global(&log_config).context("initialising installer log")?;

    let (printer_id, printer) = spawn_log_printer(log.subscribe(), log.level());
    write_header(&log, &manifest);

    for task in manifest.missing_scripts() {
        log.warn(
            task.key(),
            format!("Script not found: {}", task.script.display()),
        );
    }

    let controller = CancellationController::new();
    {
        let controller = controller.clone();
        let log = log.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            if controller.cancel() {
                log.warn(runner::RUNNER_TAG, "Cancellation requested (Ctrl+C).");
            }
        });
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let events = spawn_event_printer(events_rx);

    let executor = ProcessExecutor::new(log.clone())
        .with_interpreter(manifest.installer().interpreter)
        .with_preludes(manifest.installer().preludes.clone());

    let task_runner = TaskRunner::new(manifest.into_tasks(), executor, log.clone(), controller.token())
        .with_selection(selection)
        .with_missing_script_policy(policy)
        .with_events(events_tx);

    let report = task_runner.spawn().join().await;
    info!(state = ?report.state, "run finished");

    if let Some(file) = log.log_file() {
        log.info(runner::RUNNER_TAG, format!("Log saved to {}", file.display()));
    }

    // The runner's sender is gone once the handle is joined.
    let _ = events.await;
    log.unsubscribe(printer_id);
    let _ = printer.await;
    log.shutdown();

    Ok(Some(report))
}

fn write_header(log: &Arc<LogService>, manifest: &Manifest) {
    let installer = manifest.installer();
    let mut title = installer.name.clone();
    if let Some(version) = &installer.version {
        title.push_str(&format!(" {version}"));
    }
    if let Some(run_type) = &installer.run_type {
        title.push_str(&format!(" ({run_type})"));
    }
    log.info(runner::RUNNER_TAG, format!("=== {title} ==="));
    if let Some(description) = &installer.description {
        log.verbose(runner::RUNNER_TAG, description.clone());
    }
}

/// Print visible installer log lines to stdout until the subscription closes.
fn spawn_log_printer(
    mut subscription: LogSubscription,
    threshold: LogLevel,
) -> (log::SubscriptionId, JoinHandle<()>) {
    let id = subscription.id();
    let handle = tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            if !message.is_visible_at(threshold) {
                continue;
            }
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(
                stdout,
                "{}{}\x1b[0m",
                message.level.ansi_color(),
                message.format_line()
            );
        }
        debug!("log printer finished");
    });
    (id, handle)
}

/// Print progress to stderr; status text already reaches the installer log.
fn spawn_event_printer(mut events: mpsc::UnboundedReceiver<RunEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RunEvent::Progress(fraction) => {
                    eprintln!("progress: {:>3.0}%", fraction * 100.0);
                }
                RunEvent::Finished(report) => {
                    eprintln!("{}", report.status);
                }
                other => debug!(event = ?other, "run event"),
            }
        }
    })
}

fn print_task_list(manifest: &Manifest) {
    let selection = manifest.default_selection();
    println!("{} tasks:", manifest.installer().name);
    for task in manifest.display_tasks() {
        let mark = if selection.contains(task.key()) { "x" } else { " " };
        println!("  [{mark}] {:<24} key={}", task.label, task.key());
    }
}

/// Simple dry-run output: print the resolved plan.
fn print_dry_run(manifest: &Manifest, selection: &SelectionSet, policy: types::MissingScriptPolicy) {
    let installer = manifest.installer();
    println!("setup-runner dry-run");
    println!("  installer.name = {}", installer.name);
    println!("  installer.interpreter = {}", installer.interpreter.program());
    println!("  installer.missing_script = {policy:?}");
    println!("  installer.logging_level = {}", installer.logging_level);
    for prelude in &installer.preludes {
        println!("  prelude: {}", prelude.display());
    }
    println!();

    let plan = selection.resolve(manifest.tasks());
    println!("plan ({} of {} tasks):", plan.len(), manifest.tasks().len());
    for (index, task) in plan.iter().enumerate() {
        println!("  {}. {}", index + 1, task.display_label());
        println!("      key: {}", task.key());
        println!("      script: {}", task.script.display());
        if !task.script.is_file() {
            println!("      (script missing)");
        }
    }
    for key in selection.unmatched(manifest.tasks()) {
        println!("  ! selected key '{key}' matches no task");
    }

    debug!("dry-run complete (no execution)");
}
