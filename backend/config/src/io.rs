//! Config file read/write with atomic backup rotation.

use crate::schema::HarkConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Number of rolling backups to keep.
const MAX_BACKUPS: usize = 5;

/// Resolve the hark config directory.
/// Priority: `HARK_CONFIG_DIR` env > `~/.hark/` > `./.hark`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HARK_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    match dirs::home_dir() {
        Some(home) => home.join(".hark"),
        None => PathBuf::from(".hark"),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<HarkConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(HarkConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if raw.trim().is_empty() {
        return Ok(HarkConfig::default());
    }

    let config: HarkConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// `config.yaml.bak.<n>` next to the config file.
fn backup_path(path: &Path, n: usize) -> PathBuf {
    path.with_extension(format!("yaml.bak.{n}"))
}

/// Persist `config` as YAML. The previous file is kept as `.bak.1` (older
/// copies shift up to `.bak.5`). The new contents are staged in a temp
/// file and renamed into place.
pub async fn write_config(config: &HarkConfig, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Config does not serialize to YAML")?;

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Cannot create {}", dir.display()))?;
    }
    if path.exists() {
        keep_previous(path).await;
    }

    let staged = path.with_extension("yaml.tmp");
    fs::write(&staged, yaml)
        .await
        .with_context(|| format!("Cannot stage config at {}", staged.display()))?;
    fs::rename(&staged, path)
        .await
        .with_context(|| format!("Cannot move staged config into {}", path.display()))?;

    info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Shift existing backups up by one, dropping the oldest, then copy the
/// current file to `.bak.1`. Failures only cost a backup, so they are logged.
async fn keep_previous(path: &Path) {
    let oldest = backup_path(path, MAX_BACKUPS);
    if oldest.exists() {
        if let Err(e) = fs::remove_file(&oldest).await {
            warn!(backup = %oldest.display(), error = %e, "Could not drop oldest config backup");
        }
    }

    for n in (1..MAX_BACKUPS).rev() {
        let from = backup_path(path, n);
        if !from.exists() {
            continue;
        }
        if let Err(e) = fs::rename(&from, backup_path(path, n + 1)).await {
            warn!(backup = %from.display(), error = %e, "Could not shift config backup");
        }
    }

    let newest = backup_path(path, 1);
    match fs::copy(path, &newest).await {
        Ok(_) => debug!(backup = %newest.display(), "Backed up previous config"),
        Err(e) => warn!(backup = %newest.display(), error = %e, "Could not back up previous config"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LoggingConfig;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.yaml")).await.unwrap();
        assert_eq!(cfg, HarkConfig::default());
    }

    #[tokio::test]
    async fn write_then_load_keeps_values_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());

        let mut cfg = HarkConfig::default();
        cfg.logging = Some(LoggingConfig {
            level: Some("debug".into()),
            ..Default::default()
        });
        write_config(&cfg, &path).await.unwrap();
        assert!(!path.with_extension("yaml.bak.1").exists());

        cfg.logging = None;
        write_config(&cfg, &path).await.unwrap();
        assert!(path.with_extension("yaml.bak.1").exists());
        assert!(!path.with_extension("yaml.tmp").exists());

        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded, cfg);
    }

    #[tokio::test]
    async fn backups_are_bounded_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());

        for level in ["l1", "l2", "l3", "l4", "l5", "l6", "l7", "l8"] {
            let cfg = HarkConfig {
                logging: Some(LoggingConfig {
                    level: Some(level.into()),
                    ..Default::default()
                }),
                ..Default::default()
            };
            write_config(&cfg, &path).await.unwrap();
        }

        assert!(backup_path(&path, MAX_BACKUPS).exists());
        assert!(!backup_path(&path, MAX_BACKUPS + 1).exists());
        let newest = load_config(&backup_path(&path, 1)).await.unwrap();
        assert_eq!(newest.log_level(), "l7");
        let oldest = load_config(&backup_path(&path, MAX_BACKUPS)).await.unwrap();
        assert_eq!(oldest.log_level(), "l3");
    }

    #[tokio::test]
    async fn invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        tokio::fs::write(&path, "assistant: [not, a, map").await.unwrap();
        assert!(load_config(&path).await.is_err());
    }
}
