//! Structured logging for the hark dispatcher.
//!
//! Console plus daily-rolling file output, and a typed log of dispatch events
//! (wake, sleep, command runs, catalog rebuilds).

pub mod event_logger;
pub mod logger;

pub use event_logger::{CommandOrigin, DispatchEvent, DispatchEventLogger, EventLogEntry};
pub use logger::init_logger;
