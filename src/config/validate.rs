// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::{Result, SetupError};

impl TryFrom<RawManifest> for Manifest {
    type Error = SetupError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_raw_manifest(&raw)?;
        Ok(Manifest::new_unchecked(raw.installer, raw.tasks))
    }
}

fn validate_raw_manifest(manifest: &RawManifest) -> Result<()> {
    ensure_has_tasks(manifest)?;
    validate_installer(manifest)?;
    validate_tasks(manifest)?;
    validate_unique_keys(manifest)?;
    Ok(())
}

fn ensure_has_tasks(manifest: &RawManifest) -> Result<()> {
    if manifest.tasks.is_empty() {
        return Err(SetupError::ConfigError(
            "manifest must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_installer(manifest: &RawManifest) -> Result<()> {
    if manifest.installer.history_capacity == 0 {
        return Err(SetupError::ConfigError(
            "[installer].history_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_tasks(manifest: &RawManifest) -> Result<()> {
    for (index, task) in manifest.tasks.iter().enumerate() {
        let position = index + 1;
        if task.label.trim().is_empty() {
            return Err(SetupError::ConfigError(format!(
                "task #{position} has an empty `label`"
            )));
        }
        if task.script.as_os_str().is_empty() {
            return Err(SetupError::ConfigError(format!(
                "task '{}' has an empty `script`",
                task.label
            )));
        }
    }
    Ok(())
}

fn validate_unique_keys(manifest: &RawManifest) -> Result<()> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for task in &manifest.tasks {
        let key = task.key().trim().to_lowercase();
        if let Some(previous) = seen.insert(key.clone(), task.label.as_str()) {
            return Err(SetupError::ConfigError(format!(
                "tasks '{previous}' and '{}' share the key '{key}'",
                task.label
            )));
        }
    }
    Ok(())
}
