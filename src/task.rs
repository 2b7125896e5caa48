// src/task.rs

//! Tasks, task selection and per-task results.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Exit code reported when the task's script does not exist.
pub const EXIT_SCRIPT_MISSING: i32 = -1;
/// Exit code reported when the task's process was killed on cancellation.
pub const EXIT_CANCELLED: i32 = -2;

/// One unit of installable work, backed by a script.
///
/// Mirrors a `[[task]]` entry of the manifest:
///
/// ```toml
/// [[task]]
/// label = "Python"
/// progress_label = "Installing Python"
/// script = "scripts/ensure_python.sh"
/// package_key = "python"
/// preferred_version = "3.12"
/// minimal_required_version = "3.10"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Task {
    pub label: String,

    /// Text shown in step status updates; falls back to `label`.
    #[serde(default)]
    pub progress_label: Option<String>,

    pub script: PathBuf,

    #[serde(default)]
    pub package_key: Option<String>,

    /// Whether the task is part of the default selection.
    #[serde(default = "default_pre_checked")]
    pub pre_checked: bool,

    #[serde(default)]
    pub preferred_version: Option<String>,

    #[serde(default)]
    pub minimal_required_version: Option<String>,
}

fn default_pre_checked() -> bool {
    true
}

impl Task {
    pub fn new(label: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            progress_label: None,
            script: script.into(),
            package_key: None,
            pre_checked: true,
            preferred_version: None,
            minimal_required_version: None,
        }
    }

    /// Identity key: `package_key` if set and non-blank, otherwise `label`.
    pub fn key(&self) -> &str {
        match self.package_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => &self.label,
        }
    }

    pub fn display_label(&self) -> &str {
        match self.progress_label.as_deref() {
            Some(label) if !label.trim().is_empty() => label,
            _ => &self.label,
        }
    }

    /// File name of the script, for log lines.
    pub fn script_name(&self) -> String {
        self.script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.script.display().to_string())
    }

    /// Named parameters handed to the script, in invocation order.
    ///
    /// Unset values are passed as empty strings so scripts can rely on the
    /// parameters being present.
    pub fn script_params(&self) -> Vec<(String, String)> {
        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            ("PackageKey".to_string(), value(&self.package_key)),
            ("PreferredVersion".to_string(), value(&self.preferred_version)),
            (
                "MinimumRequiredVersion".to_string(),
                value(&self.minimal_required_version),
            ),
        ]
    }

    /// Resolve a relative script path against `base`.
    pub fn resolve_script(&mut self, base: &Path) {
        if self.script.is_relative() {
            self.script = base.join(&self.script);
        }
    }
}

/// Identity keys chosen to run. Matching is case-insensitive.
///
/// An empty selection means "run every task".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    keys: BTreeSet<String>,
}

impl SelectionSet {
    /// The empty selection, i.e. all tasks.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn insert(&mut self, key: impl AsRef<str>) {
        let key = normalize(key.as_ref());
        if !key.is_empty() {
            self.keys.insert(key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(&normalize(key))
    }

    /// Tasks to run, in list order.
    pub fn resolve<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        if self.is_empty() {
            return tasks.iter().collect();
        }
        tasks.iter().filter(|t| self.contains(t.key())).collect()
    }

    /// Selected keys that match no task.
    pub fn unmatched(&self, tasks: &[Task]) -> Vec<String> {
        self.keys
            .iter()
            .filter(|k| !tasks.iter().any(|t| normalize(t.key()) == **k))
            .cloned()
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SelectionSet::default();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskResult {
    pub exit_code: i32,
    /// Set when the process was killed because the run was cancelled.
    pub aborted: bool,
}

impl TaskResult {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            aborted: false,
        }
    }

    pub fn script_missing() -> Self {
        Self::exited(EXIT_SCRIPT_MISSING)
    }

    pub fn cancelled() -> Self {
        Self {
            exit_code: EXIT_CANCELLED,
            aborted: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.aborted
    }

    pub fn is_script_missing(&self) -> bool {
        self.exit_code == EXIT_SCRIPT_MISSING && !self.aborted
    }

    pub fn is_cancelled(&self) -> bool {
        self.aborted || self.exit_code == EXIT_CANCELLED
    }
}
