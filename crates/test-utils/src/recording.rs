use std::sync::{Arc, Mutex};

use stylewatch::engine::{CompileStatus, EngineObserver};
use stylewatch::output::OutputSink;
use stylewatch::registry::RelPath;

/// Output sink that keeps every write in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingOutput {
    writes: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(relative path, css)` pairs, in write order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn written_files(&self) -> Vec<String> {
        self.writes().into_iter().map(|(rel, _)| rel).collect()
    }
}

impl OutputSink for RecordingOutput {
    fn write(&self, rel: &RelPath, css: &str) -> anyhow::Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push((rel.as_str().to_string(), css.to_string()));
        Ok(())
    }
}

/// Observer that records notifications as short strings:
/// `tracked:<file>`, `compiled:<file>`, `failed:<file>`,
/// `dependents:<file>:<a>,<b>`.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl EngineObserver for RecordingObserver {
    fn on_tracked(&self, rel: &RelPath) {
        self.push(format!("tracked:{rel}"));
    }

    fn on_compiled(&self, rel: &RelPath, status: &CompileStatus) {
        if status.is_success() {
            self.push(format!("compiled:{rel}"));
        } else {
            self.push(format!("failed:{rel}"));
        }
    }

    fn on_dependents_recompiled(&self, changed: &RelPath, dependents: &[RelPath]) {
        let names: Vec<&str> = dependents.iter().map(RelPath::as_str).collect();
        self.push(format!("dependents:{changed}:{}", names.join(",")));
    }
}
