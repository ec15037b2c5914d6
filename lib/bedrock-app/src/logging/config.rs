use std::str::FromStr as _;

use bedrock_config::Environ;
use bedrock_error::{ErrorType, TypedError, TypedResultExt as _};
use tracing::level_filters::LevelFilter;

/// Environment variable holding the log level.
pub const LOG_LEVEL_KEY: &str = "LOG_LEVEL";

/// Environment variable selecting JSON-formatted logs.
pub const LOG_FORMAT_JSON_KEY: &str = "LOG_FORMAT_JSON";

/// Logging configuration.
#[derive(Clone, Debug)]
pub struct LoggingConfiguration {
    /// The level to log at, unless debug logging is toggled on.
    pub log_level: LevelFilter,

    /// Whether to write logs as JSON, instead of as human-readable lines.
    pub log_format_json: bool,
}

impl Default for LoggingConfiguration {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::INFO,
            log_format_json: false,
        }
    }
}

impl LoggingConfiguration {
    /// Creates a new `LoggingConfiguration` from the given environment.
    ///
    /// `LOG_LEVEL` defaults to `info`, and `LOG_FORMAT_JSON` defaults to `false`.
    ///
    /// # Errors
    ///
    /// If the log level is not recognized, an error of type `Configuration` is returned. If `LOG_FORMAT_JSON` is not a
    /// valid boolean, an error of type `InvalidBoolean` is returned.
    pub fn from_environ(env: &Environ) -> Result<Self, TypedError> {
        let log_level = match env.get(LOG_LEVEL_KEY) {
            Some(raw) => parse_log_level(raw)?,
            None => LevelFilter::INFO,
        };
        let log_format_json = env.get_bool(LOG_FORMAT_JSON_KEY)?.unwrap_or(false);

        Ok(Self {
            log_level,
            log_format_json,
        })
    }
}

fn parse_log_level(raw: &str) -> Result<LevelFilter, TypedError> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" => Ok(LevelFilter::INFO),
        "warning" => Ok(LevelFilter::WARN),
        "fatal" | "panic" | "dpanic" => Ok(LevelFilter::ERROR),
        other => LevelFilter::from_str(other).wrap_err_with(ErrorType::CONFIGURATION, || {
            format!("unsupported log level '{}'", raw)
        }),
    }
}
