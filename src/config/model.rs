// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::log::{DEFAULT_HISTORY_CAPACITY, LogConfig, LogLevel};
use crate::log::sink::default_log_dir;
use crate::task::{SelectionSet, Task};
use crate::types::{Interpreter, MissingScriptPolicy};

/// Installer manifest as read from TOML, before validation.
///
/// ```toml
/// [installer]
/// name = "DevKit"
/// logging_level = "info"
/// missing_script = "abort"
/// preludes = ["scripts/_helpers.sh"]
///
/// [[task]]
/// label = "Python"
/// script = "scripts/ensure_python.sh"
/// package_key = "python"
/// ```
///
/// Use [`Manifest::try_from`] (or the loader) to get a validated manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    #[serde(default)]
    pub installer: InstallerSection,

    /// `[[task]]` entries, in run order.
    #[serde(default, rename = "task")]
    pub tasks: Vec<Task>,
}

/// `[installer]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallerSection {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Free-form run kind shown in headers, e.g. `"Install"`.
    #[serde(default)]
    pub run_type: Option<String>,

    /// Display threshold of the installer log.
    #[serde(default)]
    pub logging_level: LogLevel,

    #[serde(default)]
    pub missing_script: MissingScriptPolicy,

    #[serde(default)]
    pub interpreter: Interpreter,

    /// Helper scripts sourced before every task script.
    #[serde(default)]
    pub preludes: Vec<PathBuf>,

    /// Directory for log files. Defaults to `<tmp>/setup-runner/logs`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_name() -> String {
    "Setup".to_string()
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for InstallerSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: None,
            description: None,
            run_type: None,
            logging_level: LogLevel::default(),
            missing_script: MissingScriptPolicy::default(),
            interpreter: Interpreter::default(),
            preludes: Vec::new(),
            log_dir: None,
            history_capacity: default_history_capacity(),
        }
    }
}

/// Validated manifest.
///
/// Built only through `TryFrom<RawManifest>`, so every instance has at least
/// one task, unique task keys and a usable history capacity.
#[derive(Debug, Clone)]
pub struct Manifest {
    installer: InstallerSection,
    tasks: Vec<Task>,
}

impl Manifest {
    pub(crate) fn new_unchecked(installer: InstallerSection, tasks: Vec<Task>) -> Self {
        Self { installer, tasks }
    }

    pub fn installer(&self) -> &InstallerSection {
        &self.installer
    }

    /// Tasks in run order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Tasks sorted by label (case-insensitive) for presentation.
    ///
    /// Run order is unaffected; use [`Manifest::tasks`] for that.
    pub fn display_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().collect();
        tasks.sort_by_cached_key(|t| t.label.to_lowercase());
        tasks
    }

    /// Keys of the tasks marked `pre_checked`.
    pub fn default_selection(&self) -> SelectionSet {
        self.tasks
            .iter()
            .filter(|t| t.pre_checked)
            .map(Task::key)
            .collect()
    }

    /// Tasks whose script file does not exist.
    pub fn missing_scripts(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| !t.script.is_file()).collect()
    }

    /// Log service configuration derived from `[installer]`.
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.installer.logging_level,
            history_capacity: self.installer.history_capacity,
            log_dir: self
                .installer
                .log_dir
                .clone()
                .unwrap_or_else(default_log_dir),
        }
    }

    /// Make every relative script and prelude path relative to `base`.
    pub(crate) fn resolve_paths(&mut self, base: &Path) {
        for task in &mut self.tasks {
            task.resolve_script(base);
        }
        for prelude in &mut self.installer.preludes {
            if prelude.is_relative() {
                *prelude = base.join(&*prelude);
            }
        }
        if let Some(dir) = &mut self.installer.log_dir {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}
