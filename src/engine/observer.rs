// src/engine/observer.rs

//! Notifications the engine emits for front ends and persistence layers.
//!
//! The engine never reaches into presentation or storage; anything that
//! wants to mirror registry activity implements [`EngineObserver`].

use crate::engine::CompileStatus;
use crate::registry::RelPath;

pub trait EngineObserver: Send + Sync {
    /// A path was added to the registry.
    fn on_tracked(&self, _file: &RelPath) {}

    /// A compile attempt finished.
    fn on_compiled(&self, _file: &RelPath, _status: &CompileStatus) {}

    /// The direct dependents of `changed` were recompiled.
    fn on_dependents_recompiled(&self, _changed: &RelPath, _dependents: &[RelPath]) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}
