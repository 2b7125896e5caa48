#![allow(dead_code)]

use std::path::PathBuf;

use setup_runner::config::{InstallerSection, Manifest, RawManifest};
use setup_runner::task::Task;
use setup_runner::types::MissingScriptPolicy;

/// Builder for `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifest {
                installer: InstallerSection::default(),
                tasks: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.manifest.tasks.push(task);
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.manifest.installer.name = name.to_string();
        self
    }

    pub fn with_missing_script(mut self, policy: MissingScriptPolicy) -> Self {
        self.manifest.installer.missing_script = policy;
        self
    }

    pub fn raw(self) -> RawManifest {
        self.manifest
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Task`.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    /// Task with `label` and a script path derived from it.
    pub fn new(label: &str) -> Self {
        Self {
            task: Task::new(label, format!("{}.sh", label.to_lowercase())),
        }
    }

    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.task.script = path.into();
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.task.package_key = Some(key.to_string());
        self
    }

    pub fn progress_label(mut self, label: &str) -> Self {
        self.task.progress_label = Some(label.to_string());
        self
    }

    pub fn unchecked(mut self) -> Self {
        self.task.pre_checked = false;
        self
    }

    pub fn versions(mut self, preferred: &str, minimum: &str) -> Self {
        self.task.preferred_version = Some(preferred.to_string());
        self.task.minimal_required_version = Some(minimum.to_string());
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Tasks `A`, `B`, `C`, ... keyed by their labels.
pub fn tasks(labels: &[&str]) -> Vec<Task> {
    labels.iter().map(|l| TaskBuilder::new(l).build()).collect()
}
