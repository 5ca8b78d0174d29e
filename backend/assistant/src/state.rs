//! Assistant lifecycle states and transition records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantState {
    /// Listening only for wake words
    #[default]
    Sleeping,
    /// Just woke; settles into Listening on the next tick
    Awake,
    /// Matching phrases against the command list
    Listening,
    /// A matched command's action is running
    ExecutingCommand,
    /// Ignoring phrases until the cooldown deadline
    Cooldown,
}

impl AssistantState {
    pub fn description(&self) -> &'static str {
        match self {
            AssistantState::Sleeping => "Waiting for a wake word",
            AssistantState::Awake => "Awake",
            AssistantState::Listening => "Listening for commands",
            AssistantState::ExecutingCommand => "Running a command",
            AssistantState::Cooldown => "Cooling down after a command",
        }
    }

    /// Whether phrases are matched against the command list in this state.
    pub fn accepts_commands(&self) -> bool {
        matches!(self, AssistantState::Awake | AssistantState::Listening)
    }

    /// Whether the main channel should hear full command keywords.
    pub fn is_active(&self) -> bool {
        !matches!(self, AssistantState::Sleeping)
    }
}

/// Why a transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    WakeWord,
    CommandMatched,
    QuickCommand,
    CommandFinished,
    Settled,
    CooldownElapsed,
    WindowExpired,
    SleepRequested,
}

impl TransitionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionReason::WakeWord => "wake_word",
            TransitionReason::CommandMatched => "command_matched",
            TransitionReason::QuickCommand => "quick_command",
            TransitionReason::CommandFinished => "command_finished",
            TransitionReason::Settled => "settled",
            TransitionReason::CooldownElapsed => "cooldown_elapsed",
            TransitionReason::WindowExpired => "window_expired",
            TransitionReason::SleepRequested => "sleep_requested",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: AssistantState,
    pub to: AssistantState,
    pub reason: TransitionReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sleeping() {
        assert_eq!(AssistantState::default(), AssistantState::Sleeping);
        assert!(!AssistantState::Sleeping.is_active());
    }

    #[test]
    fn only_awake_and_listening_accept_commands() {
        let accepting: Vec<_> = [
            AssistantState::Sleeping,
            AssistantState::Awake,
            AssistantState::Listening,
            AssistantState::ExecutingCommand,
            AssistantState::Cooldown,
        ]
        .into_iter()
        .filter(AssistantState::accepts_commands)
        .collect();
        assert_eq!(accepting, vec![AssistantState::Awake, AssistantState::Listening]);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&AssistantState::ExecutingCommand).unwrap();
        assert_eq!(json, "\"executing_command\"");
    }
}
