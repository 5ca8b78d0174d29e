//! Structured Logger
//!
//! Wraps `tracing` with a console layer, a rolling file layer, and
//! environment-based level control.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global logger.
///
/// `RUST_LOG` overrides `level`. The file under `log_dir` rotates daily and
/// is NDJSON when `json` is set. Calling this twice is harmless.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    // Writes `hark.log.YYYY-MM-DD`
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.as_ref(), "hark.log");
    let (json_file, plain_file) = if json {
        let layer = fmt::layer().json().with_writer(file_appender).with_ansi(false);
        (Some(layer), None)
    } else {
        let layer = fmt::layer().with_writer(file_appender).with_ansi(false);
        (None, Some(layer))
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(json_file)
        .with(plain_file)
        .try_init();
}
