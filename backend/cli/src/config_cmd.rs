//! `hark config` subcommands.

use std::path::Path;

use anyhow::Result;
use hark_config::{apply_all_defaults, load_config, validate, write_config, HarkConfig};

/// Print the effective config (file values with defaults applied) as YAML.
pub async fn show(path: &Path) -> Result<()> {
    let config = apply_all_defaults(load_config(path).await?);
    println!("# {}", path.display());
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

/// Print validation findings. Returns `false` when there are errors.
pub async fn check(path: &Path) -> Result<bool> {
    let config = apply_all_defaults(load_config(path).await?);
    let report = validate(&config);

    for warning in &report.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &report.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    if report.is_valid() {
        println!("{} is valid", path.display());
    }
    Ok(report.is_valid())
}

/// Write a config file populated with every default. An existing file is
/// kept unless `force` is set (the previous version goes to a backup).
pub async fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }
    write_config(&apply_all_defaults(HarkConfig::default()), path).await?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hark_config::config_file_path;

    #[tokio::test]
    async fn init_writes_a_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        init(&path, false).await.unwrap();
        assert!(path.exists());
        assert!(check(&path).await.unwrap());

        let written = load_config(&path).await.unwrap();
        assert_eq!(written.quick_command_prefix(), "hark");
    }

    #[tokio::test]
    async fn check_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        tokio::fs::write(&path, "assistant:\n  quickCommandPrefix: \"  \"\n")
            .await
            .unwrap();
        assert!(!check(&path).await.unwrap());
    }
}
