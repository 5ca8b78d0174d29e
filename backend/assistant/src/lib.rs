//! Assistant state machine and the dispatch loop that drives it.

pub mod assistant;
pub mod debounce;
pub mod dispatcher;
pub mod state;

pub use assistant::{
    clean_wake_words, quick_keywords, quick_remainder, Assistant, AssistantControl, AssistantSettings,
    IgnoreReason, PhraseOutcome,
};
pub use debounce::RebuildDebounce;
pub use dispatcher::{DispatchInputs, DispatchSinks, Dispatcher, DispatcherSettings};
pub use state::{AssistantState, Transition, TransitionReason};
