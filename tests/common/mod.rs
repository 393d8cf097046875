#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use stylewatch::engine::{ActivityLog, ChangeEvent, Engine, EngineSettings};
use stylewatch::fs::mock::MockFileSystem;
use stylewatch::registry::RelPath;
use stylewatch_test_utils::fake_compiler::FakeCompiler;
use stylewatch_test_utils::recording::{RecordingObserver, RecordingOutput};

pub const ROOT: &str = "/site/styles";

pub fn path(file: &str) -> PathBuf {
    Path::new(ROOT).join(file)
}

pub fn rel(file: &str) -> RelPath {
    RelPath::parse(file).expect("valid relative path")
}

pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        retry_delay: Duration::from_millis(1),
        ..EngineSettings::default()
    }
}

/// An engine over an in-memory root, with every collaborator observable.
pub struct Fixture {
    pub fs: MockFileSystem,
    pub compiler: Arc<FakeCompiler>,
    pub output: RecordingOutput,
    pub observer: RecordingObserver,
    pub log: ActivityLog,
    pub engine: Engine,
}

impl Fixture {
    pub fn new() -> Self {
        let fs = MockFileSystem::new();
        fs.add_dir(ROOT);
        let compiler = Arc::new(FakeCompiler::new(ROOT));
        let output = RecordingOutput::new();
        let observer = RecordingObserver::new();
        let log = ActivityLog::new();

        let engine = Engine::new(
            ROOT,
            compiler.clone(),
            Arc::new(fs.clone()),
            &fast_settings(),
        )
        .with_output(Arc::new(output.clone()))
        .with_observer(Arc::new(observer.clone()))
        .with_log(log.clone());

        Self {
            fs,
            compiler,
            output,
            observer,
            log,
            engine,
        }
    }

    /// Write `content` to `file` under the root.
    pub fn write(&self, file: &str, content: &str) {
        self.fs.add_file(path(file), content);
    }

    /// Scan the given files, then forget the compiler calls the scan made.
    pub fn scan(&mut self, files: &[&str]) {
        let paths: Vec<PathBuf> = files.iter().map(|f| path(f)).collect();
        self.engine.scan(&paths).expect("scan");
        self.compiler.clear_calls();
    }

    pub fn modify(&mut self, file: &str) -> stylewatch::engine::HandleOutcome {
        self.engine
            .handle_change(&ChangeEvent::modified(path(file)))
            .expect("handle_change")
    }
}
