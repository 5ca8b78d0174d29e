//! Command catalog management for the hark dispatcher.
//!
//! - [`registry`]: the thread-safe Command Registry with seal and change notification
//! - [`catalog`]: built-in command sources
//! - [`assembly`]: merging built-ins with registered commands
//! - [`matching`]: normalization and first-match resolution of recognized text
//! - [`templates`]: per-entity command templates driven by roster events
pub mod assembly;
pub mod catalog;
pub mod matching;
pub mod registry;
pub mod roster;
pub mod templates;

pub use assembly::{all_keywords, combine, create_all, export_json, summaries};
pub use catalog::{BuiltinCatalog, BuiltinSource};
pub use matching::{is_match, normalize, try_find_by_recognized_text};
pub use registry::{CommandRegistry, Listener, ListenerId};
pub use roster::SharedRoster;
pub use templates::{entity_label, ActionTemplate, DescriptionFactory, EntityAction, TemplateHub, TemplateRegistry};
