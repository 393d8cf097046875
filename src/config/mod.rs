// src/config/mod.rs

//! Project file loading and validation.
//!
//! - `model.rs`: the TOML-backed data model, raw and validated.
//! - `loader.rs`: read a file from disk.
//! - `validate.rs`: `RawConfigFile` → `ConfigFile` checks.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{CompilerSection, ConfigFile, ConfigSection, ProjectConfig, RawConfigFile};
