//! Service runtime.
//!
//! This module contains the building blocks that supervised services are made of.
//!
//! # Services
//!
//! A **service** is a long-running component, such as an HTTP server, a database connection pool, or a metrics exporter,
//! that is started once when the application boots and stopped once when it shuts down. Services implement
//! [`Serviceable`], which separates _starting_ a service, which must return promptly, from the long-running work the
//! service does afterwards.
//!
//! # Contexts
//!
//! Every service is started with a [`ServiceContext`]: a cancellation signal shared by all services in the application.
//! Once all services have been stopped, the context is cancelled, and any remaining background work is expected to
//! finish promptly.
//!
//! # Task groups
//!
//! Long-running work is spawned into a [`TaskGroup`], which tracks every task spawned into it. The first task to fail
//! cancels the group, which in turn signals the application to shut down, and the failure is reported once all tasks
//! have finished.

mod context;
pub use self::context::{CancelHandle, ServiceContext};

mod service;
pub use self::service::{is_deadline_exceeded, Serviceable, DEADLINE_EXCEEDED, DEFAULT_STOP_TIMEOUT};

mod task_group;
pub use self::task_group::{TaskError, TaskGroup};
