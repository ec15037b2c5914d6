//! Service supervision.
//!
//! A [`Supervisor`] owns a fixed set of [`Serviceable`] components: an optional server, an optional database, and any
//! number of auxiliary services. Running it starts every component, dispatches OS signals until shutdown is requested,
//! and then stops every component in a fixed order before waiting for their background tasks to finish.
//!
//! ## Ordering
//!
//! Components start in registration order. They stop in a fixed order regardless of how they were registered: Server,
//! then auxiliary services in reverse registration order, then Database.
//!
//! ## Signals
//!
//! `SIGINT` and `SIGTERM` begin shutdown. The debug toggle signal (`SIGUSR1` unless overridden) flips the logging
//! verbosity between the configured level and `DEBUG`. Any other signal with a registered handler invokes that handler
//! with the application [`Logger`]. Both classes of built-in signals are reserved, and cannot have handlers.

use std::{collections::HashMap, fmt, sync::Arc};

use bedrock_core::runtime::{is_deadline_exceeded, Serviceable, ServiceContext, TaskError, TaskGroup};
use bedrock_error::GenericError;
use snafu::Snafu;
use tokio::{
    select,
    sync::{mpsc, watch},
};
use tracing::{debug, error, info, level_filters::LevelFilter, warn, Instrument as _};

use crate::logging::Logger;

/// A control signal delivered to the supervisor.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Signal {
    /// `SIGINT`.
    Interrupt,

    /// `SIGTERM`.
    Terminate,

    /// `SIGHUP`.
    Hangup,

    /// `SIGQUIT`.
    Quit,

    /// `SIGUSR1`.
    User1,

    /// `SIGUSR2`.
    User2,
}

impl Signal {
    /// Returns `true` if the signal requests shutdown.
    pub fn is_interrupt(self) -> bool {
        matches!(self, Self::Interrupt | Self::Terminate)
    }

    /// Returns the conventional name of the signal.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
            Self::Quit => "SIGQUIT",
            Self::User1 => "SIGUSR1",
            Self::User2 => "SIGUSR2",
        }
    }

    #[cfg(unix)]
    fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Self::Interrupt => SignalKind::interrupt(),
            Self::Terminate => SignalKind::terminate(),
            Self::Hangup => SignalKind::hangup(),
            Self::Quit => SignalKind::quit(),
            Self::User1 => SignalKind::user_defined1(),
            Self::User2 => SignalKind::user_defined2(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a supervisor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SupervisorState {
    /// Built, but not yet running.
    Constructed,

    /// Starting services.
    Starting,

    /// All services started, and signals are being dispatched.
    Running,

    /// Stopping services and waiting for background tasks.
    ShuttingDown,

    /// Everything has stopped.
    Terminated,
}

/// Supervisor errors.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum SupervisorError {
    /// A handler was registered for a reserved signal.
    #[snafu(display("Signal {} is reserved and cannot have a handler.", signal))]
    ReservedSignal {
        /// The reserved signal.
        signal: Signal,
    },

    /// More than one handler was registered for the same signal.
    #[snafu(display("Signal {} already has a handler.", signal))]
    DuplicateSignalHandler {
        /// The signal with more than one handler.
        signal: Signal,
    },

    /// The debug toggle signal is one of the shutdown signals.
    #[snafu(display("Signal {} requests shutdown and cannot toggle debug logging.", signal))]
    InvalidDebugToggle {
        /// The requested debug toggle signal.
        signal: Signal,
    },

    /// Subscribing to an OS signal failed.
    #[snafu(display("Failed to subscribe to signal {}: {}", signal, source))]
    SignalSubscription {
        /// The signal that could not be subscribed to.
        signal: Signal,

        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A service failed to start.
    #[snafu(display("Failed to start service '{}': {}", name, source))]
    FailedToStart {
        /// Name of the service.
        name: String,

        /// The error returned by the service.
        source: GenericError,
    },

    /// A service failed to stop.
    #[snafu(display("Failed to stop service '{}': {}", name, source))]
    FailedToStop {
        /// Name of the service.
        name: String,

        /// The error returned by the service.
        source: GenericError,
    },

    /// A background task failed.
    #[snafu(display("Background task failed: {}", source))]
    TaskFailed {
        /// The task failure.
        source: TaskError,
    },
}

type SignalHandler = Box<dyn Fn(&Logger) + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Role {
    Server,
    Database,
    Auxiliary,
}

struct Registered {
    role: Role,
    service: Arc<dyn Serviceable>,
}

/// Returns the services in `started` in the order they must be stopped.
fn stop_order(started: &[Registered]) -> impl Iterator<Item = &(dyn Serviceable + 'static)> {
    let server = started.iter().filter(|r| r.role == Role::Server);
    let auxiliary = started.iter().rev().filter(|r| r.role == Role::Auxiliary);
    let database = started.iter().filter(|r| r.role == Role::Database);

    server.chain(auxiliary).chain(database).map(|r| r.service.as_ref())
}

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    logger: Logger,
    services: Vec<Registered>,
    handlers: Vec<(Signal, SignalHandler)>,
    debug_toggle: Signal,
}

impl SupervisorBuilder {
    /// Creates a new `SupervisorBuilder` with no services.
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            services: Vec::new(),
            handlers: Vec::new(),
            debug_toggle: Signal::User1,
        }
    }

    /// Sets the server.
    ///
    /// The server is the first service to stop. Setting it again replaces the previous server.
    pub fn with_server<S>(self, server: S) -> Self
    where
        S: Serviceable + 'static,
    {
        self.register_exclusive(Role::Server, Arc::new(server))
    }

    /// Sets the database.
    ///
    /// The database is the last service to stop. Setting it again replaces the previous database.
    pub fn with_database<S>(self, database: S) -> Self
    where
        S: Serviceable + 'static,
    {
        self.register_exclusive(Role::Database, Arc::new(database))
    }

    /// Adds an auxiliary service.
    pub fn with_service<S>(mut self, service: S) -> Self
    where
        S: Serviceable + 'static,
    {
        self.services.push(Registered {
            role: Role::Auxiliary,
            service: Arc::new(service),
        });
        self
    }

    fn register_exclusive(mut self, role: Role, service: Arc<dyn Serviceable>) -> Self {
        self.services.retain(|r| r.role != role);
        self.services.push(Registered { role, service });
        self
    }

    /// Registers a handler for `signal`.
    ///
    /// The handler runs on the supervisor's driver task, so it should return promptly.
    pub fn with_signal_handler<F>(mut self, signal: Signal, handler: F) -> Self
    where
        F: Fn(&Logger) + Send + Sync + 'static,
    {
        self.handlers.push((signal, Box::new(handler)));
        self
    }

    /// Sets the signal that toggles debug logging.
    ///
    /// Defaults to [`Signal::User1`].
    pub fn with_debug_toggle_signal(mut self, signal: Signal) -> Self {
        self.debug_toggle = signal;
        self
    }

    /// Builds the supervisor.
    ///
    /// # Errors
    ///
    /// If the debug toggle signal is a shutdown signal, if a handler is registered for a reserved signal, or if more
    /// than one handler is registered for the same signal, an error is returned.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        if self.debug_toggle.is_interrupt() {
            return InvalidDebugToggle {
                signal: self.debug_toggle,
            }
            .fail();
        }

        let mut handlers = HashMap::with_capacity(self.handlers.len());
        for (signal, handler) in self.handlers {
            if signal.is_interrupt() || signal == self.debug_toggle {
                return ReservedSignal { signal }.fail();
            }
            if handlers.insert(signal, handler).is_some() {
                return DuplicateSignalHandler { signal }.fail();
            }
        }

        let (state_tx, _) = watch::channel(SupervisorState::Constructed);

        Ok(Supervisor {
            logger: self.logger,
            services: self.services,
            handlers,
            debug_toggle: self.debug_toggle,
            state_tx,
        })
    }
}

/// Runs a set of services until shutdown is requested.
///
/// See the [module documentation][self] for details on ordering and signal handling.
pub struct Supervisor {
    logger: Logger,

    // In registration order, which is also start order.
    services: Vec<Registered>,
    handlers: HashMap<Signal, SignalHandler>,
    debug_toggle: Signal,
    state_tx: watch::Sender<SupervisorState>,
}

impl Supervisor {
    /// Creates a new `SupervisorBuilder`.
    pub fn builder(logger: Logger) -> SupervisorBuilder {
        SupervisorBuilder::new(logger)
    }

    /// Returns a receiver that observes the current state of the supervisor.
    pub fn state(&self) -> watch::Receiver<SupervisorState> {
        self.state_tx.subscribe()
    }

    /// Returns every signal the supervisor acts on.
    pub fn subscribed_signals(&self) -> Vec<Signal> {
        let mut signals = vec![Signal::Interrupt, Signal::Terminate, self.debug_toggle];
        signals.extend(self.handlers.keys().copied());
        signals
    }

    /// Runs the supervisor, listening for OS signals.
    ///
    /// # Errors
    ///
    /// If subscribing to a signal fails, or for any of the reasons listed in
    /// [`run_with_signals`][Self::run_with_signals], an error is returned.
    #[cfg(unix)]
    pub async fn run(self) -> Result<(), SupervisorError> {
        use snafu::ResultExt as _;
        use tokio::{signal::unix::signal, task::JoinSet};

        let (signals_tx, signals_rx) = mpsc::channel(16);
        let mut listeners = JoinSet::new();
        for sig in self.subscribed_signals() {
            let mut stream = signal(sig.kind()).context(SignalSubscription { signal: sig })?;
            let signals_tx = signals_tx.clone();
            listeners.spawn(async move {
                while stream.recv().await.is_some() {
                    if signals_tx.send(sig).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(signals_tx);

        let result = self.run_with_signals(signals_rx).await;
        listeners.abort_all();
        result
    }

    /// Runs the supervisor, taking signals from the given channel.
    ///
    /// Shutdown begins when an interrupt signal is received, when the channel is closed, or when a background task
    /// fails.
    ///
    /// # Errors
    ///
    /// If a service fails to start, already-started services are stopped, and the start error is returned.
    ///
    /// If a service fails to stop for any reason other than running past its deadline, the remaining services are not
    /// stopped, and the stop error is returned. Background tasks are still cancelled and waited for.
    ///
    /// If a background task fails, its error is returned.
    pub async fn run_with_signals(self, signals: mpsc::Receiver<Signal>) -> Result<(), SupervisorError> {
        let span = self.logger.span().clone();
        self.drive(signals).instrument(span).await
    }

    async fn drive(self, mut signals: mpsc::Receiver<Signal>) -> Result<(), SupervisorError> {
        let (root_ctx, root_handle) = ServiceContext::paired();
        let tasks = TaskGroup::new(&root_ctx);
        let ctx = tasks.context().clone();

        self.set_state(SupervisorState::Starting);
        info!(services = self.services.len(), "Starting services.");

        for (started, Registered { service, .. }) in self.services.iter().enumerate() {
            debug!(service = service.name(), "Starting service.");
            if let Err(source) = service.start(&ctx, &tasks).await {
                let name = service.name().to_string();
                error!(service = %name, error = %source, "Failed to start service. Stopping services already started.");

                self.set_state(SupervisorState::ShuttingDown);
                self.rollback(&self.services[..started]).await;
                root_handle.trigger();
                if let Err(e) = tasks.wait().await {
                    warn!(error = %e, "Background task failed while rolling back.");
                }
                self.set_state(SupervisorState::Terminated);

                return Err(SupervisorError::FailedToStart { name, source });
            }
        }

        self.set_state(SupervisorState::Running);
        info!("All services started.");

        let task_failed = loop {
            select! {
                _ = ctx.cancelled() => {
                    warn!("Background task failed. Shutting down.");
                    break true;
                }
                maybe_signal = signals.recv() => match maybe_signal {
                    Some(signal) => {
                        if self.dispatch(signal) {
                            break false;
                        }
                    }
                    None => {
                        info!("Signal channel closed. Shutting down.");
                        break false;
                    }
                },
            }
        };

        self.set_state(SupervisorState::ShuttingDown);
        info!("Stopping services.");

        let stop_result = self.stop_all().await;
        root_handle.trigger();
        let task_result = tasks.wait().await;
        self.set_state(SupervisorState::Terminated);

        match (stop_result, task_result) {
            (Ok(()), Ok(())) => {
                info!("All services stopped.");
                Ok(())
            }
            (Ok(()), Err(source)) => Err(SupervisorError::TaskFailed { source }),
            (Err(stop_error), Err(source)) if task_failed => {
                warn!(error = %stop_error, "Service also failed to stop.");
                Err(SupervisorError::TaskFailed { source })
            }
            (Err(stop_error), task_result) => {
                if let Err(e) = task_result {
                    warn!(error = %e, "Background task also failed.");
                }
                Err(stop_error)
            }
        }
    }

    /// Acts on a signal, and returns `true` if shutdown was requested.
    fn dispatch(&self, signal: Signal) -> bool {
        if signal.is_interrupt() {
            info!(%signal, "Received shutdown signal.");
            return true;
        }

        if signal == self.debug_toggle {
            let level = self.logger.verbosity().toggle_debug();
            if level == LevelFilter::DEBUG {
                info!("DEBUG logging has been ENABLED.");
            } else {
                info!(%level, "DEBUG logging has been DISABLED.");
            }
            return false;
        }

        match self.handlers.get(&signal) {
            Some(handler) => {
                debug!(%signal, "Invoking signal handler.");
                self.logger.in_scope(|| handler(&self.logger));
            }
            None => debug!(%signal, "Ignoring signal without a handler."),
        }
        false
    }

    async fn stop_all(&self) -> Result<(), SupervisorError> {
        for service in stop_order(&self.services) {
            if let Err(source) = stop_service(service).await {
                let name = service.name().to_string();
                error!(service = %name, error = %source, "Failed to stop service. Skipping remaining services.");
                return Err(SupervisorError::FailedToStop { name, source });
            }
        }

        Ok(())
    }

    async fn rollback(&self, started: &[Registered]) {
        for service in stop_order(started) {
            if let Err(e) = stop_service(service).await {
                warn!(service = service.name(), error = %e, "Failed to stop service during rollback.");
            }
        }
    }

    fn set_state(&self, state: SupervisorState) {
        self.state_tx.send_replace(state);
    }
}

/// Stops a single service within its stop timeout.
///
/// Running past the deadline is not an error: the service is considered forcibly stopped.
async fn stop_service(service: &dyn Serviceable) -> Result<(), GenericError> {
    let stop_timeout = service.stop_timeout();
    debug!(service = service.name(), ?stop_timeout, "Stopping service.");

    match tokio::time::timeout(stop_timeout, service.stop()).await {
        Ok(Ok(())) => {
            debug!(service = service.name(), "Service stopped.");
            Ok(())
        }
        Ok(Err(e)) if is_deadline_exceeded(&e) => {
            warn!(service = service.name(), error = %e, "Service did not stop before its deadline. Forcibly stopped.");
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!(
                service = service.name(),
                ?stop_timeout,
                "Service did not stop within its stop timeout. Forcibly stopped."
            );
            Ok(())
        }
    }
}
