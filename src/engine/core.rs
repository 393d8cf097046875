// src/engine/core.rs

//! Synchronous core of the watch controller.
//!
//! [`Engine`] owns one root's registry, checksum oracle, compiler adapter
//! and output sink. Every mutation goes through `&mut self`, so whoever
//! holds the engine is the single writer; the session keeps it behind one
//! mutex and runs a whole event (checksum, compile, registry update,
//! cascade) under that lock.
//!
//! Error policy per compile attempt:
//! - invalid source: fingerprint advances, import set is kept;
//! - compiler I/O failure: nothing advances;
//! - fingerprint failure: the event is dropped, nothing advances.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::checksum::{ChecksumOracle, Fingerprint};
use crate::compiler::{CompileOutput, CompilerAdapter, StyleCompiler};
use crate::engine::cascade::affected_by;
use crate::engine::log::ActivityLog;
use crate::engine::observer::{EngineObserver, NoopObserver};
use crate::engine::{ChangeEvent, CompileStatus, EngineSettings, HandleOutcome, ScanReport};
use crate::errors::{Result, StylewatchError};
use crate::fs::FileSystem;
use crate::output::{DiscardOutput, OutputSink};
use crate::registry::{FileRegistry, RelPath, TrackedFile};

pub struct Engine {
    registry: FileRegistry,
    adapter: CompilerAdapter,
    oracle: ChecksumOracle,
    fs: Arc<dyn FileSystem>,
    output: Arc<dyn OutputSink>,
    observer: Arc<dyn EngineObserver>,
    log: ActivityLog,
    partial_pattern: Regex,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("root", &self.registry.root())
            .field("tracked", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine with an empty registry for `root`.
    ///
    /// `root` should already be canonical; events are relativized against
    /// it.
    pub fn new(
        root: impl Into<PathBuf>,
        compiler: Arc<dyn StyleCompiler>,
        fs: Arc<dyn FileSystem>,
        settings: &EngineSettings,
    ) -> Self {
        let root = root.into();
        Self {
            registry: FileRegistry::new(root.clone()),
            adapter: CompilerAdapter::new(compiler, root),
            oracle: ChecksumOracle::new(Arc::clone(&fs), settings.checksum, settings.retry_delay),
            fs,
            output: Arc::new(DiscardOutput),
            observer: Arc::new(NoopObserver),
            log: ActivityLog::new(),
            partial_pattern: settings.partial_pattern.clone(),
        }
    }

    pub fn with_output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.output = output;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EngineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_log(mut self, log: ActivityLog) -> Self {
        self.log = log;
        self
    }

    /// Share the flag that aborts a pending fingerprint retry loop.
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.oracle = self.oracle.with_abort_flag(abort);
        self
    }

    pub fn root(&self) -> &Path {
        self.registry.root()
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    /// Snapshot of every tracked file, sorted by path.
    pub fn tracked_files(&self) -> Vec<TrackedFile> {
        let mut files: Vec<TrackedFile> = self.registry.iter().cloned().collect();
        files.sort_by(|a, b| a.rel().cmp(b.rel()));
        files
    }

    /// Compile every file in `files` unconditionally.
    ///
    /// A failure on one file is logged and the scan moves on; only an abort
    /// request ends it early.
    pub fn scan(&mut self, files: &[PathBuf]) -> Result<ScanReport> {
        let mut files: Vec<&PathBuf> = files.iter().collect();
        files.sort();

        let mut report = ScanReport::default();
        for path in files {
            let rel = match self.relativize(path) {
                Ok(rel) => rel,
                Err(err) => {
                    warn!(error = %err, "skipping scan entry");
                    self.log.append(format!("Skipped {}: {err}", path.display()));
                    report.skipped += 1;
                    continue;
                }
            };
            self.track(&rel);

            let fingerprint = match self.oracle.fingerprint(&self.registry.absolute_path(&rel)) {
                Ok(fp) => fp,
                Err(err @ StylewatchError::FingerprintAborted(_)) => return Err(err),
                Err(err) => {
                    warn!(file = %rel, error = %err, "could not read file during scan");
                    self.log.append(format!("Could not read file at {rel}: {err}"));
                    report.failed += 1;
                    continue;
                }
            };

            if self.compile_tracked(&rel, fingerprint).is_success() {
                report.compiled += 1;
            } else {
                report.failed += 1;
            }
        }

        info!(
            root = ?self.registry.root(),
            compiled = report.compiled,
            failed = report.failed,
            skipped = report.skipped,
            "initial scan finished"
        );
        Ok(report)
    }

    /// Handle one created / modified notification.
    pub fn handle_change(&mut self, event: &ChangeEvent) -> Result<HandleOutcome> {
        let rel = self.relativize(&event.path)?;
        debug!(file = %rel, kind = ?event.kind, "handling change event");

        let fingerprint = self.oracle.fingerprint(&self.registry.absolute_path(&rel))?;
        self.track(&rel);
        let previous = self.registry.get(&rel).and_then(TrackedFile::fingerprint);
        if previous == Some(fingerprint) {
            debug!(file = %rel, %fingerprint, "content unchanged; ignoring event");
            return Ok(HandleOutcome::Unchanged { file: rel });
        }

        // Dependents as known before this compile replaces the import set.
        let affected = affected_by(&self.registry, &rel);
        let dependents = &affected[1..];

        let status = self.compile_tracked(&rel, fingerprint);

        let mut dependent_results = Vec::with_capacity(dependents.len());
        for dependent in dependents {
            let status = match self
                .oracle
                .fingerprint(&self.registry.absolute_path(dependent))
            {
                Ok(fp) => self.compile_tracked(dependent, fp),
                Err(err @ StylewatchError::FingerprintAborted(_)) => return Err(err),
                Err(err) => {
                    warn!(file = %dependent, error = %err, "could not read dependent");
                    self.log
                        .append(format!("Could not read dependent file at {dependent}: {err}"));
                    CompileStatus::Unreadable {
                        message: err.to_string(),
                    }
                }
            };
            dependent_results.push((dependent.clone(), status));
        }

        if !dependents.is_empty() {
            info!(file = %rel, dependents = dependents.len(), "recompiled dependents");
            self.observer.on_dependents_recompiled(&rel, dependents);
        }

        Ok(HandleOutcome::Recompiled {
            file: rel,
            status,
            dependents: dependent_results,
        })
    }

    fn relativize(&self, path: &Path) -> Result<RelPath> {
        // Symlinked roots or OS-specific prefixes (macOS /private/var) can
        // make a literal prefix check fail, so retry on the canonical path.
        self.registry
            .rel_path_of(path)
            .or_else(|| {
                self.fs
                    .canonicalize(path)
                    .ok()
                    .and_then(|canonical| self.registry.rel_path_of(&canonical))
            })
            .ok_or_else(|| StylewatchError::PathOutsideRoot {
                path: path.to_path_buf(),
                root: self.registry.root().to_path_buf(),
            })
    }

    fn track(&mut self, rel: &RelPath) {
        if !self.registry.contains(rel) {
            self.registry.get_or_create(rel);
            self.observer.on_tracked(rel);
        }
    }

    /// Compile one tracked file whose current fingerprint is `fingerprint`
    /// and record the outcome.
    fn compile_tracked(&mut self, rel: &RelPath, fingerprint: Fingerprint) -> CompileStatus {
        let path = self.registry.absolute_path(rel);

        let status = match self.adapter.compile(&path) {
            Ok(output) => {
                let elapsed = output.elapsed;
                self.emit(rel, &output);
                self.registry
                    .record_compile(rel, fingerprint, Some(output.imports));
                self.log.append(format!(
                    "Successfully compiled file at {rel}, compilation took {} ms",
                    elapsed.as_millis()
                ));
                CompileStatus::Compiled { elapsed }
            }
            Err(failure) if failure.is_compile_error() => {
                self.registry.record_compile(rel, fingerprint, None);
                warn!(file = %rel, error = %failure, "compile error");
                debug!(
                    file = %rel,
                    reads = ?failure.partial_imports,
                    "files read before the error; import set left unchanged"
                );
                self.log
                    .append(format!("Error while compiling file at {rel}:\n{failure}"));
                CompileStatus::Failed {
                    message: failure.to_string(),
                }
            }
            Err(failure) => {
                warn!(file = %rel, error = %failure, "compiler could not read sources");
                self.log
                    .append(format!("Error while compiling file at {rel}:\n{failure}"));
                CompileStatus::SystemError {
                    message: failure.to_string(),
                }
            }
        };

        self.observer.on_compiled(rel, &status);
        status
    }

    fn emit(&self, rel: &RelPath, output: &CompileOutput) {
        if self.partial_pattern.is_match(rel.file_name()) {
            debug!(file = %rel, "partial; not written standalone");
            return;
        }
        if let Err(err) = self.output.write(rel, &output.css) {
            warn!(file = %rel, error = %err, "failed to write output");
            self.log
                .append(format!("Could not write output for {rel}: {err:#}"));
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::compiler::CompilerError;
    use crate::fs::mock::MockFileSystem;

    const ROOT: &str = "/proj";

    /// Compiler whose reads are scripted per file and which records calls.
    #[derive(Default)]
    struct Script {
        imports: Mutex<HashMap<String, Vec<String>>>,
        failing: Mutex<HashSet<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl Script {
        fn imports(&self, file: &str, imports: &[&str]) {
            self.imports.lock().unwrap().insert(
                file.to_string(),
                imports.iter().map(|s| s.to_string()).collect(),
            );
        }

        fn fail(&self, file: &str) {
            self.failing.lock().unwrap().insert(file.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl StyleCompiler for Script {
        fn compile_file(
            &self,
            path: &Path,
            on_read: &mut dyn FnMut(&Path),
        ) -> std::result::Result<String, CompilerError> {
            let rel = path
                .strip_prefix(ROOT)
                .unwrap()
                .to_string_lossy()
                .into_owned();
            self.calls.lock().unwrap().push(rel.clone());
            on_read(path);
            if let Some(imports) = self.imports.lock().unwrap().get(&rel) {
                for import in imports {
                    on_read(&Path::new(ROOT).join(import));
                }
            }
            if self.failing.lock().unwrap().contains(&rel) {
                return Err(CompilerError::Compile {
                    message: format!("{rel}: syntax error"),
                });
            }
            Ok(format!("/* {rel} */"))
        }
    }

    fn setup() -> (MockFileSystem, Arc<Script>, Engine) {
        let fs = MockFileSystem::new();
        let script = Arc::new(Script::default());
        let settings = EngineSettings {
            retry_delay: Duration::from_millis(1),
            ..EngineSettings::default()
        };
        let engine = Engine::new(ROOT, script.clone(), Arc::new(fs.clone()), &settings);
        (fs, script, engine)
    }

    fn path(file: &str) -> PathBuf {
        Path::new(ROOT).join(file)
    }

    fn rel(s: &str) -> RelPath {
        RelPath::parse(s).unwrap()
    }

    #[test]
    fn scan_compiles_everything_and_records_imports() {
        let (fs, script, mut engine) = setup();
        fs.add_file(path("main.scss"), "@use 'base';");
        fs.add_file(path("_base.scss"), "$x: 1;");
        script.imports("main.scss", &["_base.scss"]);

        let report = engine
            .scan(&[path("main.scss"), path("_base.scss")])
            .unwrap();

        assert_eq!(report.compiled, 2);
        assert_eq!(script.calls(), vec!["_base.scss", "main.scss"]);
        assert_eq!(
            engine.registry().dependents_of(&rel("_base.scss")),
            vec![rel("main.scss")]
        );
    }

    #[test]
    fn scan_continues_past_failures() {
        let (fs, script, mut engine) = setup();
        fs.add_file(path("a.scss"), "a");
        fs.add_file(path("b.scss"), "b");
        script.fail("a.scss");

        let report = engine
            .scan(&[path("a.scss"), path("gone.scss"), path("b.scss"), PathBuf::from("/elsewhere/c.scss")])
            .unwrap();

        assert_eq!(report, ScanReport { compiled: 1, failed: 2, skipped: 1 });
        assert_eq!(script.calls(), vec!["a.scss", "b.scss"]);
    }

    #[test]
    fn system_error_advances_nothing() {
        struct Broken;
        impl StyleCompiler for Broken {
            fn compile_file(
                &self,
                _path: &Path,
                _on_read: &mut dyn FnMut(&Path),
            ) -> std::result::Result<String, CompilerError> {
                Err(CompilerError::System(std::io::Error::other("disk gone")))
            }
        }

        let fs = MockFileSystem::new();
        fs.add_file(path("a.scss"), "a");
        let mut engine = Engine::new(
            ROOT,
            Arc::new(Broken),
            Arc::new(fs.clone()),
            &EngineSettings::default(),
        );

        let outcome = engine.handle_change(&ChangeEvent::modified(path("a.scss"))).unwrap();

        assert!(matches!(
            outcome,
            HandleOutcome::Recompiled { status: CompileStatus::SystemError { .. }, .. }
        ));
        assert_eq!(engine.registry().get(&rel("a.scss")).unwrap().fingerprint(), None);
    }

    #[test]
    fn compile_error_advances_fingerprint_but_keeps_imports() {
        let (fs, script, mut engine) = setup();
        fs.add_file(path("a.scss"), "v1");
        script.imports("a.scss", &["_d.scss"]);
        engine.handle_change(&ChangeEvent::modified(path("a.scss"))).unwrap();

        fs.add_file(path("a.scss"), "v2 {");
        script.imports("a.scss", &[]);
        script.fail("a.scss");
        engine.handle_change(&ChangeEvent::modified(path("a.scss"))).unwrap();

        let tracked = engine.registry().get(&rel("a.scss")).unwrap();
        assert!(tracked.fingerprint().is_some());
        assert_eq!(tracked.imports(), &BTreeSet::from([rel("_d.scss")]));

        // Same broken bytes again: not retried.
        let outcome = engine.handle_change(&ChangeEvent::modified(path("a.scss"))).unwrap();
        assert!(matches!(outcome, HandleOutcome::Unchanged { .. }));
        assert_eq!(script.calls().len(), 2);
    }

    #[test]
    fn event_outside_root_is_rejected_without_side_effects() {
        let (_fs, script, mut engine) = setup();
        let err = engine
            .handle_change(&ChangeEvent::modified("/other/a.scss"))
            .unwrap_err();

        assert!(matches!(err, StylewatchError::PathOutsideRoot { .. }));
        assert!(engine.registry().is_empty());
        assert!(script.calls().is_empty());
    }

    #[test]
    fn missing_file_fails_the_event() {
        let (_fs, script, mut engine) = setup();
        let err = engine
            .handle_change(&ChangeEvent::created(path("ghost.scss")))
            .unwrap_err();

        assert!(matches!(err, StylewatchError::IoError(_)));
        assert!(engine.registry().is_empty());
        assert!(script.calls().is_empty());
    }

    #[test]
    fn deleted_dependent_is_reported_unreadable() {
        let (fs, script, mut engine) = setup();
        fs.add_file(path("_a.scss"), "a");
        fs.add_file(path("b.scss"), "b");
        script.imports("b.scss", &["_a.scss"]);
        engine.scan(&[path("_a.scss"), path("b.scss")]).unwrap();

        fs.remove_file(path("b.scss"));
        fs.add_file(path("_a.scss"), "a2");
        let outcome = engine.handle_change(&ChangeEvent::modified(path("_a.scss"))).unwrap();

        match outcome {
            HandleOutcome::Recompiled { dependents, .. } => {
                assert_eq!(dependents.len(), 1);
                assert!(matches!(dependents[0].1, CompileStatus::Unreadable { .. }));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(script.calls(), vec!["_a.scss", "b.scss", "_a.scss"]);
    }
}
