#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use stylewatch::config::{CompilerSection, ConfigFile, ConfigSection, ProjectConfig, RawConfigFile};
use stylewatch::types::ChecksumAlgorithm;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                compiler: CompilerSection::default(),
                project: BTreeMap::new(),
            },
        }
    }

    pub fn with_project(mut self, name: &str, project: ProjectConfig) -> Self {
        self.config.project.insert(name.to_string(), project);
        self
    }

    pub fn extension(mut self, ext: &str) -> Self {
        self.config.config.extension = ext.to_string();
        self
    }

    pub fn checksum(mut self, alg: ChecksumAlgorithm) -> Self {
        self.config.config.checksum = alg;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.config.retry_delay_ms = ms;
        self
    }

    pub fn partial_pattern(mut self, pattern: &str) -> Self {
        self.config.config.partial_pattern = pattern.to_string();
        self
    }

    /// The unvalidated file, for exercising validation errors.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProjectConfig`.
pub struct ProjectConfigBuilder {
    project: ProjectConfig,
}

impl ProjectConfigBuilder {
    pub fn new(source: &str) -> Self {
        Self {
            project: ProjectConfig {
                source: PathBuf::from(source),
                destination: None,
                recursive: true,
                exclude: vec![],
            },
        }
    }

    pub fn destination(mut self, dest: &str) -> Self {
        self.project.destination = Some(PathBuf::from(dest));
        self
    }

    pub fn recursive(mut self, val: bool) -> Self {
        self.project.recursive = val;
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.project.exclude.push(pattern.to_string());
        self
    }

    pub fn build(self) -> ProjectConfig {
        self.project
    }
}
