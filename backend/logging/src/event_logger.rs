//! Dispatch Event Logger
//!
//! Typed dispatcher events written through `tracing` under the
//! `dispatch_events` target, so they land in the NDJSON file alongside
//! ordinary logs and can be filtered on their own.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Which phrase channel triggered a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOrigin {
    Main,
    Quick,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    Woke {
        phrase: String,
    },
    Slept {
        reason: String,
    },
    CommandExecuted {
        command: String,
        origin: CommandOrigin,
        elapsed_ms: u64,
    },
    CommandFailed {
        command: String,
        origin: CommandOrigin,
        error: String,
    },
    CatalogRebuilt {
        commands: usize,
        keywords: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: DispatchEvent,
}

impl EventLogEntry {
    pub fn new(event: DispatchEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchEventLogger;

impl DispatchEventLogger {
    pub fn log(&self, event: DispatchEvent) {
        let entry = EventLogEntry::new(event);
        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "dispatch_events", event = %json, "Dispatch event"),
            Err(_) => info!(target: "dispatch_events", event = ?entry, "Dispatch event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_serialize_with_type_tag() {
        let entry = EventLogEntry::new(DispatchEvent::CommandExecuted {
            command: "mute bob".into(),
            origin: CommandOrigin::Quick,
            elapsed_ms: 12,
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["type"], "command_executed");
        assert_eq!(json["event"]["origin"], "quick");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn logging_without_subscriber_is_a_no_op() {
        DispatchEventLogger.log(DispatchEvent::CatalogRebuilt { commands: 3, keywords: 7 });
    }
}
