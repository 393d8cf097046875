// src/output.rs

//! Where compiled CSS goes.
//!
//! The engine hands every successful, non-partial compile to an
//! [`OutputSink`] verbatim. Failures here are logged by the engine and never
//! affect change tracking.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::fs::{FileSystem, RealFileSystem};
use crate::registry::RelPath;

pub trait OutputSink: Send + Sync + Debug {
    fn write(&self, rel: &RelPath, css: &str) -> Result<()>;
}

/// Drops compiled output. Used when a project has no destination.
#[derive(Debug, Clone, Default)]
pub struct DiscardOutput;

impl OutputSink for DiscardOutput {
    fn write(&self, rel: &RelPath, css: &str) -> Result<()> {
        debug!(file = %rel, bytes = css.len(), "no destination; output discarded");
        Ok(())
    }
}

/// Mirrors the source tree under a destination root, swapping the file
/// extension (`a/site.scss` → `<dest>/a/site.css`).
#[derive(Debug, Clone)]
pub struct DirectoryOutput {
    destination: PathBuf,
    extension: String,
    fs: Arc<dyn FileSystem>,
}

impl DirectoryOutput {
    pub fn new(destination: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self::with_fs(destination, extension, Arc::new(RealFileSystem))
    }

    pub fn with_fs(
        destination: impl Into<PathBuf>,
        extension: impl Into<String>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            destination: destination.into(),
            extension: extension.into(),
            fs,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn target_path(&self, rel: &RelPath) -> PathBuf {
        rel.to_path(&self.destination).with_extension(&self.extension)
    }
}

impl OutputSink for DirectoryOutput {
    fn write(&self, rel: &RelPath, css: &str) -> Result<()> {
        let target = self.target_path(rel);
        self.fs
            .write(&target, css.as_bytes())
            .with_context(|| format!("writing compiled output to {:?}", target))?;
        debug!(file = %rel, ?target, "wrote compiled output");
        Ok(())
    }
}
