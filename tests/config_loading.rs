// tests/config_loading.rs

use setup_runner_test_utils::builders::{ManifestBuilder, TaskBuilder};
use setup_runner_test_utils::scripts::{write_manifest, write_script};

use std::error::Error;

use setup_runner::config::{Manifest, default_manifest_path, load_and_validate, load_from_path};
use setup_runner::errors::SetupError;
use setup_runner::log::LogLevel;
use setup_runner::types::{Interpreter, MissingScriptPolicy};

type TestResult = Result<(), Box<dyn Error>>;

const FULL_MANIFEST: &str = r#"
[installer]
name = "DevKit"
version = "1.0.0"
description = "Developer workstation setup"
run_type = "Install"
logging_level = "warning"
missing_script = "skip"
interpreter = "sh"
preludes = ["scripts/_helpers.sh"]
log_dir = "logs"
history_capacity = 500

[[task]]
label = "python"
progress_label = "Installing Python"
script = "scripts/ensure_python.sh"
package_key = "python"
preferred_version = "3.12"
minimal_required_version = "3.10"

[[task]]
label = "Git"
script = "scripts/ensure_git.sh"
pre_checked = false

[[task]]
label = "Node"
script = "/opt/setup/node.sh"
"#;

#[test]
fn full_manifest_is_loaded_and_resolved() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_manifest(dir.path(), FULL_MANIFEST);

    let manifest = load_and_validate(&path)?;
    let installer = manifest.installer();
    assert_eq!(installer.name, "DevKit");
    assert_eq!(installer.version.as_deref(), Some("1.0.0"));
    assert_eq!(installer.logging_level, LogLevel::Warning);
    assert_eq!(installer.missing_script, MissingScriptPolicy::Skip);
    assert_eq!(installer.interpreter, Interpreter::Sh);
    assert_eq!(installer.preludes, vec![dir.path().join("scripts/_helpers.sh")]);

    let tasks = manifest.tasks();
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].script, dir.path().join("scripts/ensure_python.sh"));
    assert_eq!(tasks[0].display_label(), "Installing Python");
    assert_eq!(tasks[2].script, std::path::PathBuf::from("/opt/setup/node.sh"));

    let log_config = manifest.log_config();
    assert_eq!(log_config.level, LogLevel::Warning);
    assert_eq!(log_config.history_capacity, 500);
    assert_eq!(log_config.log_dir, dir.path().join("logs"));
    Ok(())
}

#[test]
fn display_order_is_case_insensitive_by_label() -> TestResult {
    let dir = tempfile::tempdir()?;
    let manifest = load_and_validate(write_manifest(dir.path(), FULL_MANIFEST))?;

    let labels: Vec<&str> = manifest.display_tasks().iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, vec!["Git", "Node", "python"]);

    // Run order is untouched.
    assert_eq!(manifest.tasks()[0].label, "python");
    Ok(())
}

#[test]
fn default_selection_holds_pre_checked_keys() -> TestResult {
    let dir = tempfile::tempdir()?;
    let manifest = load_and_validate(write_manifest(dir.path(), FULL_MANIFEST))?;

    let selection = manifest.default_selection();
    assert!(selection.contains("python"));
    assert!(selection.contains("node"));
    assert!(!selection.contains("git"));
    assert_eq!(selection.len(), 2);
    Ok(())
}

#[test]
fn missing_scripts_are_listed_not_fatal() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("scripts"))?;
    write_script(&dir.path().join("scripts"), "ensure_git.sh", "true");
    let manifest = load_and_validate(write_manifest(dir.path(), FULL_MANIFEST))?;

    let missing: Vec<&str> = manifest.missing_scripts().iter().map(|t| t.key()).collect();
    assert_eq!(missing, vec!["python", "Node"]);
    Ok(())
}

#[test]
fn raw_load_keeps_paths_as_written() -> TestResult {
    let dir = tempfile::tempdir()?;
    let raw = load_from_path(write_manifest(dir.path(), FULL_MANIFEST))?;
    assert_eq!(raw.tasks[0].script, std::path::PathBuf::from("scripts/ensure_python.sh"));
    Ok(())
}

#[test]
fn defaults_apply_without_installer_section() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_manifest(
        dir.path(),
        "[[task]]\nlabel = \"A\"\nscript = \"a.sh\"\n",
    );
    let manifest = load_and_validate(path)?;
    assert_eq!(manifest.installer().missing_script, MissingScriptPolicy::Abort);
    assert_eq!(manifest.installer().logging_level, LogLevel::Info);
    assert_eq!(manifest.installer().interpreter, Interpreter::default());
    assert!(manifest.tasks()[0].pre_checked);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/setup.toml").unwrap_err();
    assert!(matches!(err, SetupError::IoError(_)), "{err:?}");
}

#[test]
fn bad_enum_value_is_a_toml_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_manifest(
        dir.path(),
        "[installer]\nmissing_script = \"ignore\"\n\n[[task]]\nlabel = \"A\"\nscript = \"a.sh\"\n",
    );
    let err = load_and_validate(path).unwrap_err();
    assert!(matches!(err, SetupError::TomlError(_)), "{err:?}");
    Ok(())
}

#[test]
fn bad_logging_level_is_a_toml_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_manifest(
        dir.path(),
        "[installer]\nlogging_level = \"loud\"\n\n[[task]]\nlabel = \"A\"\nscript = \"a.sh\"\n",
    );
    let err = load_and_validate(path).unwrap_err();
    assert!(err.to_string().contains("invalid log level"), "{err}");
    Ok(())
}

#[test]
fn builder_rejects_duplicate_keys() {
    let raw = ManifestBuilder::new()
        .with_task(TaskBuilder::new("A").key("same").build())
        .with_task(TaskBuilder::new("B").key("SAME").build())
        .raw();
    assert!(Manifest::try_from(raw).is_err());
}

#[test]
fn default_path_is_setup_toml() {
    assert_eq!(default_manifest_path(), std::path::PathBuf::from("setup.toml"));
}
