// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StylewatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// The watched root is missing or is not a directory.
    #[error("Watched root does not exist or is not a directory: {0:?}")]
    RootNotFound(PathBuf),

    /// An event or scan entry pointed outside the watched root.
    #[error("Path {path:?} is outside the watched root {root:?}")]
    PathOutsideRoot { path: PathBuf, root: PathBuf },

    /// The session was stopped while waiting for a file to become readable.
    #[error("Fingerprinting aborted for {0:?}")]
    FingerprintAborted(PathBuf),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StylewatchError>;
