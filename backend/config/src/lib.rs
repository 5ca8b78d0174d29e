//! `hark-config`: runtime configuration for the hark dispatcher.
//!
//! Provides:
//! - Typed config schema (assistant timing, wake words, registry, logging)
//! - YAML read/write with atomic backup rotation
//! - Default value application
//! - Validation
//! - Persisted feature flags (`settings.json`)

pub mod defaults;
pub mod flags;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use flags::{normalize_key, FlagStore};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use schema::{AssistantConfig, HarkConfig, LoggingConfig, RegistryConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Load, apply defaults, and validate a config file.
///
/// Validation warnings are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<HarkConfig> {
    let config = apply_all_defaults(load_config(path).await?);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        bail!(hark_core::HarkError::ConfigError(format!(
            "{} invalid field(s) in {}",
            report.errors.len(),
            path.display()
        )));
    }

    Ok(config)
}

/// Log directory for `config`, resolved against `config_dir` when relative.
pub fn log_dir(config: &HarkConfig, config_dir: &Path) -> PathBuf {
    let dir = config
        .logging
        .as_ref()
        .and_then(|l| l.dir.clone())
        .unwrap_or_else(|| defaults::DEFAULT_LOG_DIR.to_string());
    let dir = PathBuf::from(dir);
    if dir.is_absolute() {
        dir
    } else {
        config_dir.join(dir)
    }
}
