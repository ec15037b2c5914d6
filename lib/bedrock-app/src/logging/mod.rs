//! Logging.
//!
//! Events are written to standard output, either as JSON or as human-readable lines, and filtered by a shared
//! [`Verbosity`] that can be flipped between the configured level and `DEBUG` while the application is running.

use bedrock_error::GenericError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

use crate::bootstrap::AppDetails;

mod config;
pub use self::config::{LoggingConfiguration, LOG_FORMAT_JSON_KEY, LOG_LEVEL_KEY};

mod layer;
use self::layer::build_formatting_layer;

mod level;
pub use self::level::{Logger, Verbosity};

/// A guard that keeps the logging backends alive.
///
/// Must be held until the application is about to exit, so that pending log lines are flushed.
pub struct LoggingGuard {
    worker_guards: Vec<WorkerGuard>,
    verbosity: Verbosity,
}

impl LoggingGuard {
    /// Returns the verbosity controlling the installed subscriber.
    pub fn verbosity(&self) -> &Verbosity {
        &self.verbosity
    }
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("worker_guards", &self.worker_guards.len())
            .field("verbosity", &self.verbosity)
            .finish()
    }
}

/// Logs a message to standard error and exits the process with a non-zero exit code.
pub fn fatal_and_exit(message: String) -> ! {
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

/// Initializes the global `tracing` subscriber.
///
/// Logs are written to standard output through a non-blocking writer, as either JSON or human-readable lines depending
/// on [`LoggingConfiguration::log_format_json`]. Filtering is driven by a [`Verbosity`] that starts at the configured
/// level, and is available from the returned [`LoggingGuard`].
///
/// # Errors
///
/// If a global subscriber was already installed, an error is returned.
pub fn initialize_logging(
    config: &LoggingConfiguration, app_details: &AppDetails,
) -> Result<LoggingGuard, GenericError> {
    let verbosity = Verbosity::new(config.log_level);

    let (nb_stdout, worker_guard) = tracing_appender::non_blocking(std::io::stdout());
    let console_layer = build_formatting_layer(config, app_details.name(), nb_stdout).with_filter(verbosity.clone());

    tracing_subscriber::registry().with(console_layer).try_init()?;

    Ok(LoggingGuard {
        worker_guards: vec![worker_guard],
        verbosity,
    })
}
