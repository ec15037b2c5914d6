//! High-level application primitives.
//!
//! This crate provides the pieces needed to bootstrap and run an application: reading its identifying details,
//! initializing logging, and supervising its long-running services until shutdown.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod bootstrap;
pub mod logging;
pub mod supervisor;

/// Common imports.
pub mod prelude {
    pub use super::bootstrap::{update_pid_file, AppDetails};
    pub use super::logging::{fatal_and_exit, initialize_logging, Logger, LoggingConfiguration, LoggingGuard, Verbosity};
    pub use super::supervisor::{Signal, Supervisor, SupervisorBuilder, SupervisorError, SupervisorState};
}
