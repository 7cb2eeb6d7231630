//! Logging setup over `tracing-subscriber`.
//!
//! The base level comes from [`LoggingConfig`]; `RUST_LOG` overrides it
//! wholesale. With a configured file path, output goes through a non-blocking
//! appender whose guard must stay alive for the lifetime of the process.

use std::ffi::OsStr;
use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Keeps the file writer flushing; drop it only at shutdown.
pub struct LogGuard {
    _appender: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initializes the global subscriber from config.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(config: &LoggingConfig) -> LogGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    match &config.file {
        Some(path) => {
            let appender = tracing_appender::rolling::never(
                path.parent().unwrap_or_else(|| Path::new(".")),
                path.file_name().unwrap_or_else(|| OsStr::new("braze.log")),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            LogGuard {
                _appender: Some(guard),
            }
        }
        None => {
            let _ = fmt().with_env_filter(filter).compact().try_init();
            LogGuard { _appender: None }
        }
    }
}
