use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use tracing::{level_filters::LevelFilter, subscriber::Interest, Level, Metadata, Span};
use tracing_subscriber::layer::{Context, Filter};

use crate::bootstrap::AppDetails;

// Ordered from least to most verbose, so that the index of a level doubles as its encoded value.
const LEVELS: [LevelFilter; 6] = [
    LevelFilter::OFF,
    LevelFilter::ERROR,
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

fn encode(level: LevelFilter) -> u8 {
    LEVELS.iter().position(|l| *l == level).unwrap_or(3) as u8
}

fn decode(value: u8) -> LevelFilter {
    LEVELS.get(value as usize).copied().unwrap_or(LevelFilter::INFO)
}

struct VerbosityState {
    configured: LevelFilter,
    current: AtomicU8,
}

/// The current logging verbosity.
///
/// `Verbosity` holds the level that was configured at startup alongside the level currently in effect, which can be
/// flipped to `DEBUG` and back at runtime via [`toggle_debug`][Self::toggle_debug]. It is cheaply cloneable, and all
/// clones share the same state.
///
/// `Verbosity` is also a per-layer [`Filter`], consulted on every event, so changes take effect immediately.
#[derive(Clone)]
pub struct Verbosity {
    state: Arc<VerbosityState>,
}

impl Verbosity {
    /// Creates a new `Verbosity` starting at the given level.
    pub fn new(configured: LevelFilter) -> Self {
        Self {
            state: Arc::new(VerbosityState {
                configured,
                current: AtomicU8::new(encode(configured)),
            }),
        }
    }

    /// Returns the level that was originally configured.
    pub fn configured(&self) -> LevelFilter {
        self.state.configured
    }

    /// Returns the level currently in effect.
    pub fn current(&self) -> LevelFilter {
        decode(self.state.current.load(Ordering::Acquire))
    }

    /// Returns `true` if debug logging is currently in effect.
    pub fn is_debug(&self) -> bool {
        self.current() == LevelFilter::DEBUG
    }

    /// Flips the current level between `DEBUG` and the configured level.
    ///
    /// If the current level is `DEBUG`, the configured level is restored. Otherwise, the level is set to `DEBUG`.
    /// Returns the level now in effect.
    pub fn toggle_debug(&self) -> LevelFilter {
        let debug = encode(LevelFilter::DEBUG);
        let configured = encode(self.state.configured);
        let flip = |current: u8| if current == debug { configured } else { debug };

        let previous = self
            .state
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| Some(flip(current)))
            .unwrap_or_else(|current| current);

        decode(flip(previous))
    }

    /// Returns `true` if events at `level` should currently be logged.
    pub fn allows(&self, level: &Level) -> bool {
        *level <= self.current()
    }
}

impl std::fmt::Debug for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verbosity")
            .field("configured", &self.configured())
            .field("current", &self.current())
            .finish()
    }
}

impl<S> Filter<S> for Verbosity {
    fn enabled(&self, metadata: &Metadata<'_>, _: &Context<'_, S>) -> bool {
        self.allows(metadata.level())
    }

    fn callsite_enabled(&self, _: &'static Metadata<'static>) -> Interest {
        // The level can change at any time, so interest can never be cached.
        Interest::sometimes()
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        None
    }
}

/// A handle for logging on behalf of the application.
///
/// `Logger` carries the application's root span, which records the application name, version, and commit, as well as
/// the shared [`Verbosity`]. Events emitted within [`in_scope`][Self::in_scope], or while the span is entered, are
/// attributed to the application.
#[derive(Clone, Debug)]
pub struct Logger {
    span: Span,
    verbosity: Verbosity,
}

impl Logger {
    /// Creates the root logger for the given application.
    pub fn root(app_details: &AppDetails, verbosity: Verbosity) -> Self {
        // Created at ERROR so that the span, and its fields, exist at every level other than OFF.
        let span = tracing::error_span!(
            "app",
            app_name = %app_details.name(),
            app_version = %app_details.version(),
            commit_id = tracing::field::Empty,
        );
        if let Some(commit) = app_details.commit() {
            span.record("commit_id", commit);
        }

        Self { span, verbosity }
    }

    /// Creates a child logger, scoped under this logger, with the given name.
    pub fn named(&self, name: &str) -> Self {
        let span = tracing::error_span!(parent: &self.span, "logger", logger_name = %name);
        Self {
            span,
            verbosity: self.verbosity.clone(),
        }
    }

    /// Returns the span of this logger.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Returns the shared verbosity.
    pub fn verbosity(&self) -> &Verbosity {
        &self.verbosity
    }

    /// Runs `f` within the span of this logger.
    pub fn in_scope<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.span.in_scope(f)
    }
}
