// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::log::LogLevel;
use crate::task::SelectionSet;
use crate::types::MissingScriptPolicy;

/// Command-line arguments for `setup-runner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "setup-runner",
    version,
    about = "Run installer task scripts in order, with a persistent log.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the installer manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = "setup.toml")]
    pub config: String,

    /// Run only these task keys (comma separated, case-insensitive).
    ///
    /// Without `--select` or `--all` the manifest's pre-checked tasks run.
    #[arg(long, value_name = "KEY,...", value_delimiter = ',', conflicts_with = "all")]
    pub select: Vec<String>,

    /// Run every task regardless of `pre_checked`.
    #[arg(long)]
    pub all: bool,

    /// Display threshold of the installer log (verbose, info, ok, warning,
    /// error, success, docs). Overrides `[installer].logging_level`.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Diagnostics level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SETUP_RUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub trace_level: Option<TraceLevel>,

    /// Print the tasks in the manifest and exit.
    #[arg(long)]
    pub list: bool,

    /// Parse + validate, print the plan, but don't run any script.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[installer].missing_script` (abort or skip).
    #[arg(long, value_name = "POLICY")]
    pub missing_script: Option<MissingScriptPolicy>,
}

impl CliArgs {
    /// Explicit selection from the command line, if any.
    ///
    /// `Some(empty)` means "all tasks"; `None` defers to the manifest.
    pub fn selection(&self) -> Option<SelectionSet> {
        if self.all {
            Some(SelectionSet::all())
        } else if self.select.is_empty() {
            None
        } else {
            Some(self.select.iter().collect())
        }
    }
}

/// Diagnostics level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum TraceLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_splits_on_commas() {
        let args = CliArgs::parse_from(["setup-runner", "--select", "git,Python"]);
        let selection = args.selection().unwrap();
        assert!(selection.contains("git"));
        assert!(selection.contains("python"));
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn all_means_empty_selection() {
        let args = CliArgs::parse_from(["setup-runner", "--all"]);
        assert!(args.selection().unwrap().is_empty());
    }

    #[test]
    fn no_selection_defers_to_manifest() {
        let args = CliArgs::parse_from(["setup-runner"]);
        assert!(args.selection().is_none());
        assert_eq!(args.config, "setup.toml");
    }

    #[test]
    fn levels_and_policy_parse() {
        let args = CliArgs::parse_from([
            "setup-runner",
            "--log-level",
            "warn",
            "--missing-script",
            "skip",
            "--trace-level",
            "debug",
        ]);
        assert_eq!(args.log_level, Some(LogLevel::Warning));
        assert_eq!(args.missing_script, Some(MissingScriptPolicy::Skip));
        assert!(matches!(args.trace_level, Some(TraceLevel::Debug)));
    }

    #[test]
    fn select_conflicts_with_all() {
        assert!(CliArgs::try_parse_from(["setup-runner", "--all", "--select", "a"]).is_err());
    }
}
