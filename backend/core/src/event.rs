use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a roster entity (e.g. a session member's actor number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A roster participant as last described by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Display-name hint; may be blank.
    pub display_name: String,
}

impl Entity {
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id: EntityId(id),
            display_name: display_name.into(),
        }
    }
}

/// A recognized phrase delivered by the phrase source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseEvent {
    pub text: String,
    /// Approximate time the speaker started the phrase.
    pub started_at: DateTime<Utc>,
}

impl PhraseEvent {
    /// A phrase that started right now (typed input, tests).
    pub fn new(text: impl Into<String>) -> Self {
        Self::started_at(text, Utc::now())
    }

    pub fn started_at(text: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            started_at,
        }
    }

    /// Recognition latency relative to `now`, never negative.
    pub fn latency(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Roster membership change delivered by the host session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RosterEvent {
    /// The local participant joined a session that already has these members.
    SessionJoined { members: Vec<Entity> },
    EntityJoined { entity: Entity },
    EntityLeft { id: EntityId },
    /// Every entity is considered gone at once.
    SessionEnded,
}
