// src/config/mod.rs

//! Installer manifest: TOML model, loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_manifest_path, load_and_validate, load_from_path};
pub use model::{InstallerSection, Manifest, RawManifest};
