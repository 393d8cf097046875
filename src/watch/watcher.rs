// src/watch/watcher.rs

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::ChangeEvent;
use crate::errors::Result;
use crate::registry::RelPath;
use crate::types::ChangeKind;
use crate::watch::{ChangeSource, Subscription, WatchSpec};

/// [`ChangeSource`] backed by the platform's recommended `notify` watcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifySource;

impl ChangeSource for NotifySource {
    fn subscribe(
        &self,
        spec: &WatchSpec,
        events: mpsc::UnboundedSender<ChangeEvent>,
    ) -> Result<Subscription> {
        let callback_spec = spec.clone();

        // Called synchronously by notify on its own thread.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in classify(&callback_spec, &event) {
                        if events.send(change).is_err() {
                            debug!("session event loop gone; dropping notification");
                            return;
                        }
                    }
                }
                Err(err) => warn!(error = %err, "file watch error"),
            },
            Config::default(),
        )?;

        let mode = if spec.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&spec.root, mode)?;

        info!(root = ?spec.root, recursive = spec.recursive, "file watcher started");
        Ok(Subscription::new(watcher))
    }
}

/// Turn one notify event into the change events a session cares about.
///
/// Only creations and modifications of source files under the root are
/// kept; with a non-recursive spec, files in subdirectories are dropped.
pub fn classify(spec: &WatchSpec, event: &Event) -> Vec<ChangeEvent> {
    // A rename reports the old name too; only the new one still exists.
    let (kind, paths) = match event.kind {
        EventKind::Create(_) => (ChangeKind::Created, &event.paths[..]),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => return Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            (ChangeKind::Modified, event.paths.get(1..).unwrap_or_default())
        }
        EventKind::Modify(_) => (ChangeKind::Modified, &event.paths[..]),
        _ => return Vec::new(),
    };

    paths
        .iter()
        .filter(|path| {
            let Some(rel) = RelPath::from_absolute(&spec.root, path) else {
                return false;
            };
            if !spec.recursive && rel.as_str().contains('/') {
                return false;
            }
            spec.filter.matches(&rel)
        })
        .map(|path| ChangeEvent::new(path.clone(), kind))
        .collect()
}
