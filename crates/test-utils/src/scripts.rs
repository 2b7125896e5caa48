use std::fs;
use std::path::{Path, PathBuf};

/// Write a POSIX shell script `name` with `body` into `dir`.
///
/// Scripts are sourced by the interpreter, so no execute bit is needed.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write test script");
    path
}

/// Write a manifest file `setup.toml` into `dir`.
pub fn write_manifest(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("setup.toml");
    fs::write(&path, contents).expect("write test manifest");
    path
}
