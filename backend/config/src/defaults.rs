//! Config defaults: applies default values to parsed config.

use crate::schema::{AssistantConfig, HarkConfig, LoggingConfig, RegistryConfig};

pub const DEFAULT_AWAKE_WINDOW_MS: u64 = 20_000;

pub const DEFAULT_COMMAND_COOLDOWN_MS: u64 = 1_000;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;

/// Collapses bursts of registry changes into one catalog rebuild.
pub const DEFAULT_REBUILD_DEBOUNCE_MS: u64 = 250;

pub const DEFAULT_SEAL_WINDOW_MS: u64 = 1_500;

pub const DEFAULT_QUICK_COMMAND_PREFIX: &str = "hark";

pub const DEFAULT_LATENCY_COMPENSATION: bool = true;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_LOG_DIR: &str = "logs";

pub fn default_wake_words() -> Vec<String> {
    vec!["hey hark".to_string(), "okay hark".to_string()]
}

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: HarkConfig) -> HarkConfig {
    let config = apply_assistant_defaults(config);
    let config = apply_registry_defaults(config);
    apply_logging_defaults(config)
}

fn apply_assistant_defaults(mut config: HarkConfig) -> HarkConfig {
    let assistant = config.assistant.get_or_insert_with(AssistantConfig::default);
    assistant.awake_window_ms.get_or_insert(DEFAULT_AWAKE_WINDOW_MS);
    assistant.command_cooldown_ms.get_or_insert(DEFAULT_COMMAND_COOLDOWN_MS);
    assistant.tick_interval_ms.get_or_insert(DEFAULT_TICK_INTERVAL_MS);
    assistant.wake_words.get_or_insert_with(default_wake_words);
    assistant
        .quick_command_prefix
        .get_or_insert_with(|| DEFAULT_QUICK_COMMAND_PREFIX.to_string());
    assistant.latency_compensation.get_or_insert(DEFAULT_LATENCY_COMPENSATION);
    config
}

fn apply_registry_defaults(mut config: HarkConfig) -> HarkConfig {
    let registry = config.registry.get_or_insert_with(RegistryConfig::default);
    registry.seal_window_ms.get_or_insert(DEFAULT_SEAL_WINDOW_MS);
    registry.rebuild_debounce_ms.get_or_insert(DEFAULT_REBUILD_DEBOUNCE_MS);
    config
}

fn apply_logging_defaults(mut config: HarkConfig) -> HarkConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    if logging.json.is_none() {
        logging.json = Some(false);
    }
    if logging.dir.is_none() {
        logging.dir = Some(DEFAULT_LOG_DIR.to_string());
    }
    config
}
