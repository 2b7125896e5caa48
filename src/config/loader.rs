// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::Result;

/// Load a manifest from `path` without semantic validation.
///
/// Paths inside the manifest are left as written. Use [`load_and_validate`]
/// for a manifest that is ready to run.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifest> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let manifest: RawManifest = toml::from_str(&contents)?;

    Ok(manifest)
}

/// Load, validate and resolve a manifest.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks tasks, keys and `[installer]` values.
/// - Resolves relative script, prelude and log paths against the manifest's
///   directory.
///
/// Missing script files are not an error here; see
/// [`Manifest::missing_scripts`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Manifest> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    let mut manifest = Manifest::try_from(raw)?;

    let base = manifest_dir(path);
    manifest.resolve_paths(&base);
    debug!(
        manifest = %path.display(),
        base = %base.display(),
        tasks = manifest.tasks().len(),
        "manifest loaded"
    );

    Ok(manifest)
}

/// `setup.toml` in the current working directory.
pub fn default_manifest_path() -> PathBuf {
    PathBuf::from("setup.toml")
}

/// Directory relative paths in the manifest are resolved against.
///
/// A bare file name like `setup.toml` has an empty parent; that means the
/// current working directory.
fn manifest_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
