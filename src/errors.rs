// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::runner::RunState;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("failed to spawn interpreter for task '{task}': {source}")]
    Spawn {
        task: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid script parameter name: {0:?}")]
    InvalidParameter(String),

    #[error("illegal run state transition {from:?} -> {to:?}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SetupError>;
