// src/config/validate.rs

use globset::Glob;
use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, StylewatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StylewatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.compiler, raw.project))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_projects(cfg)?;
    validate_global_config(cfg)?;
    validate_compiler(cfg)?;
    validate_projects(cfg)?;
    Ok(())
}

fn ensure_has_projects(cfg: &RawConfigFile) -> Result<()> {
    if cfg.project.is_empty() {
        return Err(StylewatchError::ConfigError(
            "config must contain at least one [project.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let section = &cfg.config;

    for (key, ext) in [
        ("extension", &section.extension),
        ("output_extension", &section.output_extension),
    ] {
        if ext.trim().is_empty() || ext.starts_with('.') {
            return Err(StylewatchError::ConfigError(format!(
                "[config].{key} must be a non-empty extension without a leading dot (got {ext:?})"
            )));
        }
    }

    if section.retry_delay_ms == 0 {
        return Err(StylewatchError::ConfigError(
            "[config].retry_delay_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Err(e) = Regex::new(&section.partial_pattern) {
        return Err(StylewatchError::ConfigError(format!(
            "[config].partial_pattern is not a valid regex: {e}"
        )));
    }

    Ok(())
}

fn validate_compiler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.compiler.program.trim().is_empty() {
        return Err(StylewatchError::ConfigError(
            "[compiler].program must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_projects(cfg: &RawConfigFile) -> Result<()> {
    for (name, project) in cfg.project.iter() {
        if project.source.as_os_str().is_empty() {
            return Err(StylewatchError::ConfigError(format!(
                "project '{name}' has an empty `source`"
            )));
        }
        for pattern in project.exclude.iter() {
            if let Err(e) = Glob::new(pattern) {
                return Err(StylewatchError::ConfigError(format!(
                    "project '{name}' has an invalid exclude pattern '{pattern}': {e}"
                )));
            }
        }
    }
    Ok(())
}
