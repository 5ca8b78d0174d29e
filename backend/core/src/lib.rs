pub mod command;
pub mod error;
pub mod event;
pub mod traits;

pub use command::{Action, Command, CommandBuilder, CommandSummary, DEFAULT_CATEGORY};
pub use error::HarkError;
pub use event::{Entity, EntityId, PhraseEvent, RosterEvent};
pub use traits::{flag_keys, AckSink, Acknowledgment, FlagSource, KeywordSink, Roster, RosterObserver};
