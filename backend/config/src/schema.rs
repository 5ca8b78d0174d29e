//! hark runtime configuration schema.
//!
//! Every field is optional on disk; [`crate::apply_all_defaults`] fills the
//! gaps and the accessor methods fall back to the same defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::defaults::*;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarkConfig {
    /// Wake words, windows, and the quick-command prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant: Option<AssistantConfig>,

    /// Registry seal and rebuild timing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awake_window_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_cooldown_ms: Option<u64>,

    /// Period of the timeout-checking tick loop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wake_words: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_command_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_compensation: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Grace period before sealing at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seal_window_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebuild_debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Write the log file as NDJSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,

    /// Log directory; relative paths resolve against the config dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved accessors
// ---------------------------------------------------------------------------

impl HarkConfig {
    fn assistant_or_default(&self) -> AssistantConfig {
        self.assistant.clone().unwrap_or_default()
    }

    fn registry_or_default(&self) -> RegistryConfig {
        self.registry.clone().unwrap_or_default()
    }

    pub fn awake_window(&self) -> Duration {
        ms(self.assistant_or_default().awake_window_ms, DEFAULT_AWAKE_WINDOW_MS)
    }

    pub fn command_cooldown(&self) -> Duration {
        ms(self.assistant_or_default().command_cooldown_ms, DEFAULT_COMMAND_COOLDOWN_MS)
    }

    pub fn tick_interval(&self) -> Duration {
        ms(self.assistant_or_default().tick_interval_ms, DEFAULT_TICK_INTERVAL_MS)
    }

    pub fn wake_words(&self) -> Vec<String> {
        self.assistant_or_default()
            .wake_words
            .unwrap_or_else(default_wake_words)
    }

    pub fn quick_command_prefix(&self) -> String {
        self.assistant_or_default()
            .quick_command_prefix
            .unwrap_or_else(|| DEFAULT_QUICK_COMMAND_PREFIX.to_string())
    }

    pub fn latency_compensation(&self) -> bool {
        self.assistant_or_default()
            .latency_compensation
            .unwrap_or(DEFAULT_LATENCY_COMPENSATION)
    }

    pub fn seal_window(&self) -> Duration {
        ms(self.registry_or_default().seal_window_ms, DEFAULT_SEAL_WINDOW_MS)
    }

    pub fn rebuild_debounce(&self) -> Duration {
        ms(self.registry_or_default().rebuild_debounce_ms, DEFAULT_REBUILD_DEBOUNCE_MS)
    }

    pub fn log_level(&self) -> String {
        self.logging
            .as_ref()
            .and_then(|l| l.level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

fn ms(value: Option<u64>, default: u64) -> Duration {
    Duration::from_millis(value.unwrap_or(default))
}
