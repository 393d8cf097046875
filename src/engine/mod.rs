// src/engine/mod.rs

//! Incremental recompilation engine.
//!
//! - [`core::Engine`] is the synchronous, deterministic part: it owns the
//!   registry, the checksum oracle and the compiler adapter, and handles the
//!   initial scan and one change event at a time. No tokio, no notify.
//! - [`session::WatchSession`] is the async shell around it: the
//!   Stopped / ScanningInitial / Watching state machine, the notification
//!   subscription and the serialized event loop.
//! - [`cascade`] decides which files a change affects.
//! - [`observer`] and [`log`] are how the engine reports what it did.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::registry::RelPath;
use crate::types::{ChangeKind, ChecksumAlgorithm};

pub mod cascade;
pub mod core;
pub mod log;
pub mod observer;
pub mod session;

pub use self::cascade::affected_by;
pub use self::core::Engine;
pub use self::log::ActivityLog;
pub use self::observer::{EngineObserver, NoopObserver};
pub use self::session::{SessionSpec, SessionState, WatchSession};

/// A filesystem notification, as consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path of the file that changed.
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Created)
    }
}

/// Knobs shared by every engine a session builds.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub checksum: ChecksumAlgorithm,
    /// Delay between attempts to read a file that is still being written.
    pub retry_delay: Duration,
    /// Matches file names that are compiled and tracked but never written
    /// standalone (Sass partials).
    pub partial_pattern: Regex,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            checksum: ChecksumAlgorithm::default(),
            retry_delay: Duration::from_millis(100),
            partial_pattern: Regex::new("^_").expect("static regex"),
        }
    }
}

/// Result of one compile attempt for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileStatus {
    /// Compiled; fingerprint and import set advanced.
    Compiled { elapsed: Duration },
    /// The source is invalid; fingerprint advanced, import set kept.
    Failed { message: String },
    /// The compiler could not reach the source or an import; nothing
    /// advanced, so the next event retries.
    SystemError { message: String },
    /// A dependent could not be fingerprinted (e.g. deleted); not compiled.
    Unreadable { message: String },
}

impl CompileStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileStatus::Compiled { .. })
    }
}

/// What handling one change event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Same bytes as last time; nothing was compiled.
    Unchanged { file: RelPath },
    /// The file was recompiled, followed by its direct dependents in order.
    Recompiled {
        file: RelPath,
        status: CompileStatus,
        dependents: Vec<(RelPath, CompileStatus)>,
    },
}

impl HandleOutcome {
    /// Files compiled while handling the event, in order.
    pub fn compiled_files(&self) -> Vec<RelPath> {
        match self {
            HandleOutcome::Unchanged { .. } => Vec::new(),
            HandleOutcome::Recompiled {
                file, dependents, ..
            } => std::iter::once(file.clone())
                .chain(
                    dependents
                        .iter()
                        .filter(|(_, status)| !matches!(status, CompileStatus::Unreadable { .. }))
                        .map(|(rel, _)| rel.clone()),
                )
                .collect(),
        }
    }
}

/// Totals for an initial scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub compiled: usize,
    pub failed: usize,
    pub skipped: usize,
}
