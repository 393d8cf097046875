// src/watch/mod.rs

//! Filesystem side of a watch session.
//!
//! This module is responsible for:
//! - deciding which files under a root are style sources ([`patterns`]);
//! - enumerating them for the initial scan;
//! - turning OS notifications into [`ChangeEvent`]s ([`watcher`]).
//!
//! It knows nothing about fingerprints, imports or compiling.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::engine::ChangeEvent;
use crate::errors::Result;

pub mod patterns;
pub mod watcher;

pub use patterns::{collect_source_files, SourceFilter};
pub use watcher::NotifySource;

/// What a subscription observes.
#[derive(Debug, Clone)]
pub struct WatchSpec {
    /// Canonical root directory.
    pub root: PathBuf,
    pub recursive: bool,
    pub filter: SourceFilter,
}

/// Live notification subscription. Dropping it unsubscribes.
pub struct Subscription {
    _inner: Box<dyn Any + Send>,
}

impl Subscription {
    pub fn new(inner: impl Any + Send) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish()
    }
}

/// Source of change notifications for one root.
///
/// Production code uses [`NotifySource`]; tests inject events by hand.
/// Events must be delivered in the order they happened; duplicates are fine.
pub trait ChangeSource: Send + Sync {
    fn subscribe(
        &self,
        spec: &WatchSpec,
        events: mpsc::UnboundedSender<ChangeEvent>,
    ) -> Result<Subscription>;
}
