// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::engine::EngineSettings;
use crate::errors::{Result, StylewatchError};
use crate::types::ChecksumAlgorithm;
use crate::watch::SourceFilter;

/// Project file exactly as deserialized, before validation.
///
/// ```toml
/// [config]
/// extension = "scss"
/// checksum = "crc32"
///
/// [compiler]
/// program = "sass"
///
/// [project.site]
/// source = "styles"
/// destination = "public/css"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub compiler: CompilerSection,

    /// Keyed by project name.
    #[serde(default)]
    pub project: BTreeMap<String, ProjectConfig>,
}

/// A validated project file. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    compiler: CompilerSection,
    project: BTreeMap<String, ProjectConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        compiler: CompilerSection,
        project: BTreeMap<String, ProjectConfig>,
    ) -> Self {
        Self {
            config,
            compiler,
            project,
        }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn compiler(&self) -> &CompilerSection {
        &self.compiler
    }

    pub fn projects(&self) -> &BTreeMap<String, ProjectConfig> {
        &self.project
    }

    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.project.get(name)
    }

    /// Engine knobs derived from `[config]`.
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let partial_pattern = Regex::new(&self.config.partial_pattern).map_err(|e| {
            StylewatchError::ConfigError(format!("invalid [config].partial_pattern: {e}"))
        })?;
        Ok(EngineSettings {
            checksum: self.config.checksum,
            retry_delay: Duration::from_millis(self.config.retry_delay_ms),
            partial_pattern,
        })
    }

    /// Scan / notification filter for one project.
    pub fn source_filter(&self, project: &ProjectConfig) -> Result<SourceFilter> {
        SourceFilter::new(&self.config.extension, &project.exclude)
            .map_err(|e| StylewatchError::ConfigError(format!("{e:#}")))
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Extension of the source files to watch, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Extension given to written output files.
    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    #[serde(default)]
    pub checksum: ChecksumAlgorithm,

    /// Pause between attempts to read a file another process still holds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Regex on the file name marking partials (compiled, never written).
    #[serde(default = "default_partial_pattern")]
    pub partial_pattern: String,
}

fn default_extension() -> String {
    "scss".to_string()
}

fn default_output_extension() -> String {
    "css".to_string()
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_partial_pattern() -> String {
    "^_".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            output_extension: default_output_extension(),
            checksum: ChecksumAlgorithm::default(),
            retry_delay_ms: default_retry_delay_ms(),
            partial_pattern: default_partial_pattern(),
        }
    }
}

/// `[compiler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilerSection {
    /// Sass executable, looked up on `PATH` unless it contains a separator.
    #[serde(default = "default_program")]
    pub program: String,

    /// Extra import search directories, relative to the config file.
    #[serde(default)]
    pub load_paths: Vec<PathBuf>,
}

fn default_program() -> String {
    "sass".to_string()
}

impl Default for CompilerSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            load_paths: Vec::new(),
        }
    }
}

/// `[project.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Watched root.
    pub source: PathBuf,

    /// Where compiled CSS goes. Output is discarded when absent.
    #[serde(default)]
    pub destination: Option<PathBuf>,

    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Glob patterns, relative to `source`, of files to leave alone.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_recursive() -> bool {
    true
}

impl ProjectConfig {
    /// `source`, resolved against `base` when relative.
    pub fn source_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.source)
    }

    pub fn destination_dir(&self, base: &Path) -> Option<PathBuf> {
        self.destination.as_ref().map(|d| base.join(d))
    }
}
