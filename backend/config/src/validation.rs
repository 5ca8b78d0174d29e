//! Config validation with user-friendly error messages.

use crate::schema::HarkConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &HarkConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_timing(config, &mut report);
    validate_wake_words(config, &mut report);
    validate_quick_prefix(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_timing(config: &HarkConfig, report: &mut ValidationReport) {
    if config.awake_window().is_zero() {
        report.error("assistant.awakeWindowMs", "Awake window must be > 0");
    }
    if config.command_cooldown() >= config.awake_window() {
        report.error(
            "assistant.commandCooldownMs",
            "Command cooldown must be shorter than the awake window",
        );
    }
    if config.tick_interval().is_zero() {
        report.error("assistant.tickIntervalMs", "Tick interval must be > 0");
    } else if config.tick_interval() > config.command_cooldown() {
        report.warn(
            "assistant.tickIntervalMs",
            "Tick interval is longer than the cooldown; cooldown will end late",
        );
    }
    if config.seal_window().as_secs() > 30 {
        report.warn("registry.sealWindowMs", "Seal window over 30s delays startup");
    }
}

fn validate_wake_words(config: &HarkConfig, report: &mut ValidationReport) {
    let words = config.wake_words();
    if words.iter().all(|w| w.trim().is_empty()) {
        report.warn(
            "assistant.wakeWords",
            "No wake words configured; falling back to \"hey hark\"",
        );
    }
}

fn validate_quick_prefix(config: &HarkConfig, report: &mut ValidationReport) {
    let prefix = config.quick_command_prefix();
    if prefix.trim().is_empty() {
        report.error("assistant.quickCommandPrefix", "Quick-command prefix cannot be blank");
    } else if prefix.trim().contains(char::is_whitespace) {
        report.warn(
            "assistant.quickCommandPrefix",
            "Quick-command prefix should be a single word",
        );
    }
}

fn validate_logging(config: &HarkConfig, report: &mut ValidationReport) {
    let level = config.log_level();
    if !["trace", "debug", "info", "warn", "error", "off"].contains(&level.to_lowercase().as_str()) {
        report.warn("logging.level", format!("Unknown log level '{level}'"));
    }
}
