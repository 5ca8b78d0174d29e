//! Capabilities the dispatcher requires from its host.
//!
//! Speech capture, notification display, settings storage and session
//! networking all live outside this workspace; the dispatcher only talks to
//! them through these traits.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::event::{Entity, EntityId, RosterEvent};

/// Well-known feature flag keys.
pub mod flag_keys {
    /// Whether user-visible acknowledgments are shown.
    pub const NOTIFICATIONS: &str = "hark_notifications";
    /// Whether the prefixed quick-command channel is active.
    pub const QUICK_COMMANDS: &str = "hark_quick_commands";
}

/// A phrase recognizer that can be told which phrases to listen for.
///
/// Every call supplies the full replacement list; the dispatcher never diffs.
pub trait KeywordSink: Send + Sync {
    fn start_listening(&self, phrases: &[String]);

    fn stop_listening(&self);
}

/// A user-visible acknowledgment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Acknowledgment {
    Wake { message: String },
    Asleep,
    CommandFailed { command: String, error: String },
}

/// Delivers acknowledgments; how they are rendered is up to the host.
pub trait AckSink: Send + Sync {
    fn acknowledge(&self, ack: Acknowledgment);
}

/// Read access to persisted feature flags.
pub trait FlagSource: Send + Sync {
    fn is_enabled(&self, key: &str) -> bool;

    /// Persist pending changes if the save debounce has elapsed.
    fn flush_if_due(&self, _now: Instant) {}

    /// Persist pending changes now (shutdown).
    fn flush(&self) {}
}

/// The host's current view of session membership.
pub trait Roster: Send + Sync {
    fn members(&self) -> Vec<Entity>;

    fn get(&self, id: EntityId) -> Option<Entity>;
}

/// Receives roster membership changes.
pub trait RosterObserver: Send + Sync {
    fn on_session_joined(&self, members: &[Entity]);

    fn on_entity_joined(&self, entity: &Entity);

    fn on_entity_left(&self, id: EntityId);

    fn on_session_ended(&self);

    fn apply(&self, event: &RosterEvent) {
        match event {
            RosterEvent::SessionJoined { members } => self.on_session_joined(members),
            RosterEvent::EntityJoined { entity } => self.on_entity_joined(entity),
            RosterEvent::EntityLeft { id } => self.on_entity_left(*id),
            RosterEvent::SessionEnded => self.on_session_ended(),
        }
    }
}
