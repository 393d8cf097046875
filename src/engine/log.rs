// src/engine/log.rs

//! Per-session activity log: the timestamped, human-readable record of what
//! a session did ("compiled X in N ms", compile errors, start / stop).

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;

#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    lines: Arc<Mutex<Vec<String>>>,
    echo: bool,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that also prints every line to stdout as it is appended.
    pub fn echoing() -> Self {
        Self {
            lines: Arc::default(),
            echo: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, message: impl AsRef<str>) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message.as_ref());
        if self.echo {
            println!("{line}");
        }
        self.lock().push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|line| line.contains(needle))
    }

    /// Whole log as one string, one line per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.lock().iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
