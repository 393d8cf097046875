// src/lib.rs

pub mod checksum;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod output;
pub mod registry;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::compiler::{SassCliCompiler, StyleCompiler};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{ActivityLog, SessionSpec, WatchSession};
use crate::errors::StylewatchError;
use crate::output::{DirectoryOutput, DiscardOutput, OutputSink};
use crate::watch::{ChangeSource, NotifySource};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - one watch session per selected project
/// - the Sass compiler and the `notify` change source
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root_dir = config_root_dir(&config_path);

    if args.dry_run {
        print_dry_run(&cfg, &root_dir);
        return Ok(());
    }

    let names = select_projects(&cfg, &args.projects)?;

    let load_paths = cfg
        .compiler()
        .load_paths
        .iter()
        .map(|p| root_dir.join(p))
        .collect();
    let compiler: Arc<dyn StyleCompiler> =
        Arc::new(SassCliCompiler::new(cfg.compiler().program.clone(), load_paths));
    let source: Arc<dyn ChangeSource> = Arc::new(NotifySource);

    let mut built = Vec::with_capacity(names.len());
    for name in names {
        let session = build_session(&cfg, &root_dir, &name, &compiler, &source)?;
        built.push(session);
    }

    let mut sessions = start_sessions(built).await?;

    if args.once {
        info!("--once: initial pass done, not watching");
    } else {
        info!(sessions = sessions.len(), "watching; press Ctrl+C to stop");
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C; stopping");
        }
    }

    for session in sessions.iter_mut() {
        session.stop().await?;
    }

    let failed: usize = sessions
        .iter()
        .filter_map(|s| s.last_scan())
        .map(|report| report.failed)
        .sum();
    if args.once && failed > 0 {
        anyhow::bail!("{failed} file(s) failed to compile");
    }

    Ok(())
}

/// Start every session, keeping the ones that came up.
///
/// A project whose start fails (missing root, watcher error) is reported
/// and skipped; the run fails only if none of them started.
pub async fn start_sessions(sessions: Vec<WatchSession>) -> Result<Vec<WatchSession>> {
    let requested = sessions.len();
    let mut started = Vec::with_capacity(requested);
    for mut session in sessions {
        match session.start().await {
            Ok(()) => started.push(session),
            Err(err) => {
                warn!(project = session.name(), error = %err, "could not start project; skipping");
                eprintln!("stylewatch: project '{}' not started: {err}", session.name());
            }
        }
    }

    if started.is_empty() && requested > 0 {
        anyhow::bail!("none of the {requested} selected project(s) could be started");
    }
    Ok(started)
}

fn build_session(
    cfg: &ConfigFile,
    root_dir: &Path,
    name: &str,
    compiler: &Arc<dyn StyleCompiler>,
    source: &Arc<dyn ChangeSource>,
) -> Result<WatchSession> {
    let project = cfg
        .project(name)
        .ok_or_else(|| StylewatchError::ProjectNotFound(name.to_string()))?;

    let spec = SessionSpec {
        name: name.to_string(),
        root: project.source_dir(root_dir),
        recursive: project.recursive,
        filter: cfg.source_filter(project)?,
        settings: cfg.engine_settings()?,
    };

    let output: Arc<dyn OutputSink> = match project.destination_dir(root_dir) {
        Some(dest) => Arc::new(DirectoryOutput::new(
            dest,
            cfg.config().output_extension.clone(),
        )),
        None => Arc::new(DiscardOutput),
    };

    debug!(project = name, root = ?spec.root, "built watch session");
    Ok(
        WatchSession::new(spec, Arc::clone(compiler), Arc::clone(source))
            .with_output(output)
            .with_log(ActivityLog::echoing()),
    )
}

/// Projects named on the command line, or all of them.
fn select_projects(cfg: &ConfigFile, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(cfg.projects().keys().cloned().collect());
    }
    for name in requested {
        if cfg.project(name).is_none() {
            return Err(StylewatchError::ProjectNotFound(name.clone()).into());
        }
    }
    Ok(requested.to_vec())
}

/// Directory containing the config file, or `.`.
fn config_root_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Simple dry-run output: print settings and projects.
fn print_dry_run(cfg: &ConfigFile, root_dir: &Path) {
    let section = cfg.config();
    println!("stylewatch dry-run");
    println!("  config.extension = {}", section.extension);
    println!("  config.output_extension = {}", section.output_extension);
    println!("  config.checksum = {:?}", section.checksum);
    println!("  config.retry_delay_ms = {}", section.retry_delay_ms);
    println!("  config.partial_pattern = {}", section.partial_pattern);
    println!("  compiler.program = {}", cfg.compiler().program);
    if !cfg.compiler().load_paths.is_empty() {
        println!("  compiler.load_paths = {:?}", cfg.compiler().load_paths);
    }
    println!();

    println!("projects ({}):", cfg.projects().len());
    for (name, project) in cfg.projects() {
        println!("  - {name}");
        println!("      source: {}", project.source_dir(root_dir).display());
        match project.destination_dir(root_dir) {
            Some(dest) => println!("      destination: {}", dest.display()),
            None => println!("      destination: (none, output discarded)"),
        }
        println!("      recursive: {}", project.recursive);
        if !project.exclude.is_empty() {
            println!("      exclude: {:?}", project.exclude);
        }
    }

    debug!("dry-run complete (nothing compiled)");
}
