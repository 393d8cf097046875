// src/engine/session.rs

//! Async shell around [`Engine`]: one watched root, started and stopped on
//! request.
//!
//! State machine:
//!
//! ```text
//! Stopped --start--> ScanningInitial --scan done--> Watching --stop--> Stopped
//! ```
//!
//! While watching, a single task drains the notification channel and runs
//! each event to completion on the blocking pool, holding the engine lock,
//! before it looks at the next one. `start` and `stop` take `&mut self`, so
//! transitions can never interleave; `stop` waits for the in-flight event
//! (or aborts its fingerprint retry) before unsubscribing.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::compiler::StyleCompiler;
use crate::engine::core::Engine;
use crate::engine::log::ActivityLog;
use crate::engine::observer::{EngineObserver, NoopObserver};
use crate::engine::{ChangeEvent, EngineSettings, HandleOutcome, ScanReport};
use crate::errors::{Result, StylewatchError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::output::{DiscardOutput, OutputSink};
use crate::registry::TrackedFile;
use crate::watch::{collect_source_files, ChangeSource, SourceFilter, Subscription, WatchSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    ScanningInitial,
    Watching,
}

/// Everything that parameterizes one session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub name: String,
    pub root: PathBuf,
    pub recursive: bool,
    pub filter: SourceFilter,
    pub settings: EngineSettings,
}

/// Resources that only exist while the session is running.
struct Running {
    engine: Arc<Mutex<Engine>>,
    abort: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    event_loop: Option<JoinHandle<()>>,
    subscription: Option<Subscription>,
}

pub struct WatchSession {
    spec: SessionSpec,
    compiler: Arc<dyn StyleCompiler>,
    source: Arc<dyn ChangeSource>,
    fs: Arc<dyn FileSystem>,
    output: Arc<dyn OutputSink>,
    observer: Arc<dyn EngineObserver>,
    log: ActivityLog,
    state: SessionState,
    last_scan: Option<ScanReport>,
    running: Option<Running>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("name", &self.spec.name)
            .field("root", &self.spec.root)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn lock_engine(engine: &Mutex<Engine>) -> Result<MutexGuard<'_, Engine>> {
    engine
        .lock()
        .map_err(|_| StylewatchError::Other(anyhow!("engine mutex poisoned")))
}

impl WatchSession {
    pub fn new(
        spec: SessionSpec,
        compiler: Arc<dyn StyleCompiler>,
        source: Arc<dyn ChangeSource>,
    ) -> Self {
        Self {
            spec,
            compiler,
            source,
            fs: Arc::new(RealFileSystem),
            output: Arc::new(DiscardOutput),
            observer: Arc::new(NoopObserver),
            log: ActivityLog::new(),
            state: SessionState::Stopped,
            last_scan: None,
            running: None,
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
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

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn root(&self) -> &Path {
        &self.spec.root
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != SessionState::Stopped
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.log
    }

    /// Totals of the most recent initial scan.
    pub fn last_scan(&self) -> Option<ScanReport> {
        self.last_scan
    }

    /// Snapshot of the registry; empty while stopped.
    pub fn tracked_files(&self) -> Result<Vec<TrackedFile>> {
        match &self.running {
            Some(running) => Ok(lock_engine(&running.engine)?.tracked_files()),
            None => Ok(Vec::new()),
        }
    }

    /// Scan the root, then subscribe to notifications for it.
    ///
    /// Does nothing if the session is already running. On error the session
    /// is left stopped.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Stopped {
            warn!(session = %self.spec.name, state = ?self.state, "start requested while running");
            return Ok(());
        }

        match self.try_start().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.state = SessionState::Stopped;
                self.log.append(format!("Could not start preprocessing: {err}"));
                Err(err)
            }
        }
    }

    async fn try_start(&mut self) -> Result<()> {
        let root = match self.fs.canonicalize(&self.spec.root) {
            Ok(root) if self.fs.is_dir(&root) => root,
            _ => return Err(StylewatchError::RootNotFound(self.spec.root.clone())),
        };

        self.state = SessionState::ScanningInitial;
        self.log.append("Preprocessing started");
        info!(session = %self.spec.name, ?root, "starting watch session");

        let abort = Arc::new(AtomicBool::new(false));
        let engine = Engine::new(
            root.clone(),
            Arc::clone(&self.compiler),
            Arc::clone(&self.fs),
            &self.spec.settings,
        )
        .with_output(Arc::clone(&self.output))
        .with_observer(Arc::clone(&self.observer))
        .with_log(self.log.clone())
        .with_abort_flag(Arc::clone(&abort));
        let engine = Arc::new(Mutex::new(engine));

        let files = collect_source_files(
            self.fs.as_ref(),
            &root,
            &self.spec.filter,
            self.spec.recursive,
        )?;
        debug!(session = %self.spec.name, files = files.len(), "initial scan");

        let report = {
            let engine = Arc::clone(&engine);
            tokio::task::spawn_blocking(move || lock_engine(&engine)?.scan(&files))
                .await
                .map_err(|e| StylewatchError::Other(e.into()))??
        };
        self.last_scan = Some(report);
        self.log.append(format!(
            "Initial pass finished: {} compiled, {} failed",
            report.compiled, report.failed
        ));

        let (tx, rx) = mpsc::unbounded_channel();
        let watch_spec = WatchSpec {
            root,
            recursive: self.spec.recursive,
            filter: self.spec.filter.clone(),
        };
        let subscription = self.source.subscribe(&watch_spec, tx)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let event_loop = tokio::spawn(run_event_loop(
            self.spec.name.clone(),
            Arc::clone(&engine),
            rx,
            shutdown_rx,
            self.log.clone(),
        ));

        self.running = Some(Running {
            engine,
            abort,
            shutdown: Some(shutdown_tx),
            event_loop: Some(event_loop),
            subscription: Some(subscription),
        });
        self.state = SessionState::Watching;
        Ok(())
    }

    /// Stop watching and discard the registry.
    ///
    /// Waits for the event being handled, if any, to finish first.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            self.state = SessionState::Stopped;
            return Ok(());
        };

        running.abort.store(true, Ordering::SeqCst);
        if let Some(shutdown) = running.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(event_loop) = running.event_loop.take() {
            if let Err(err) = event_loop.await {
                error!(session = %self.spec.name, error = %err, "event loop task failed");
            }
        }
        drop(running.subscription.take());
        drop(running);

        self.state = SessionState::Stopped;
        self.log.append("Preprocessing stopped");
        info!(session = %self.spec.name, "watch session stopped");
        Ok(())
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        if let Some(running) = self.running.as_mut() {
            running.abort.store(true, Ordering::SeqCst);
            if let Some(shutdown) = running.shutdown.take() {
                let _ = shutdown.send(());
            }
        }
    }
}

/// Drain notifications one at a time until shutdown or until the source
/// goes away.
async fn run_event_loop(
    name: String,
    engine: Arc<Mutex<Engine>>,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    mut shutdown: oneshot::Receiver<()>,
    log: ActivityLog,
) {
    debug!(session = %name, "event loop started");

    loop {
        let event = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    debug!(session = %name, "notification channel closed");
                    break;
                }
            },
        };

        debug!(session = %name, ?event, "received change event");

        let handler_engine = Arc::clone(&engine);
        let result = tokio::task::spawn_blocking(move || {
            lock_engine(&handler_engine)?.handle_change(&event)
        })
        .await;

        match result {
            Ok(Ok(HandleOutcome::Unchanged { file })) => {
                debug!(session = %name, %file, "duplicate notification ignored");
            }
            Ok(Ok(outcome)) => {
                debug!(session = %name, compiled = ?outcome.compiled_files(), "event handled");
            }
            Ok(Err(StylewatchError::FingerprintAborted(path))) => {
                debug!(session = %name, ?path, "handler aborted by stop request");
                break;
            }
            Ok(Err(err)) => {
                warn!(session = %name, error = %err, "failed to handle change event");
                log.append(format!("Unhandled error: {err}"));
            }
            Err(err) => {
                error!(session = %name, error = %err, "change handler panicked");
                log.append(format!("Unhandled error: {err}"));
            }
        }
    }

    debug!(session = %name, "event loop finished");
}
