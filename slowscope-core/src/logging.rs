//! Logging setup for programs embedding the inspector.
//!
//! `RUST_LOG` wins over the verbosity flags when it is set.

use crate::Result;
use crate::error::SlowscopeError;
use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event, for log shippers
    Json,
}

/// Maps CLI-style verbosity to a level.
///
/// 0=INFO, 1=DEBUG, 2+=TRACE; `quiet` forces ERROR.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes text logging based on verbosity level.
///
/// # Example
/// ```rust,no_run
/// use slowscope_core::logging::init_logging;
///
/// // Initialize at DEBUG level
/// init_logging(1, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    init_logging_with(verbose, quiet, LogFormat::Text)
}

/// [`init_logging`] with an explicit output format.
///
/// # Errors
/// `Configuration` when a global subscriber is already installed.
pub fn init_logging_with(verbose: u8, quiet: bool, format: LogFormat) -> Result<()> {
    let level = level_for(verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| {
        SlowscopeError::configuration(format!("Failed to initialize logging: {}", e))
    })
}
