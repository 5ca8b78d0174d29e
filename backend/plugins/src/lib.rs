pub mod context;
pub mod host;
pub mod lifecycle;

pub use context::PluginContext;
pub use host::PluginHost;
pub use lifecycle::{run_load_sequence, run_unload_sequence, Plugin, PluginState};
