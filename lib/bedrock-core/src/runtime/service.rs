use std::time::Duration;

use async_trait::async_trait;
use bedrock_error::{get_type, ErrorType, GenericError};

use super::{ServiceContext, TaskGroup};

/// A stop operation did not finish within its deadline.
///
/// Stop errors of this type are not fatal to a supervisor: the service is considered forcibly stopped, and shutdown
/// carries on with the remaining services.
pub const DEADLINE_EXCEEDED: ErrorType = ErrorType::from_static("DeadlineExceeded");

/// Default amount of time a service is given to stop.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(15);

/// A long-running service that can be started and stopped by a supervisor.
#[async_trait]
pub trait Serviceable: Send + Sync {
    /// Returns the name of the service.
    fn name(&self) -> &str;

    /// Starts the service.
    ///
    /// Starting must not wait on long-running work: any such work must be spawned into `tasks`, and should finish
    /// promptly once `ctx` is cancelled.
    ///
    /// # Errors
    ///
    /// If the service cannot be started, an error is returned.
    async fn start(&self, ctx: &ServiceContext, tasks: &TaskGroup) -> Result<(), GenericError>;

    /// Stops the service.
    ///
    /// Stop is called at most once. Callers bound it by [`stop_timeout`][Self::stop_timeout], but services with a deadline
    /// of their own should report running past it with an error of type [`DEADLINE_EXCEEDED`].
    ///
    /// # Errors
    ///
    /// If the service cannot be stopped cleanly, an error is returned.
    async fn stop(&self) -> Result<(), GenericError>;

    /// Returns the amount of time the service is given to stop.
    fn stop_timeout(&self) -> Duration {
        DEFAULT_STOP_TIMEOUT
    }
}

/// Returns `true` if `err` is classified as [`DEADLINE_EXCEEDED`].
pub fn is_deadline_exceeded(err: &GenericError) -> bool {
    let err: &(dyn std::error::Error + 'static) = err.as_ref();
    get_type(err) == DEADLINE_EXCEEDED
}

#[cfg(test)]
mod tests {
    use bedrock_error::{generic_error, ErrorContext as _, TypedError};

    use super::*;

    struct Idle;

    #[async_trait]
    impl Serviceable for Idle {
        fn name(&self) -> &str {
            "idle"
        }

        async fn start(&self, _ctx: &ServiceContext, _tasks: &TaskGroup) -> Result<(), GenericError> {
            Ok(())
        }

        async fn stop(&self) -> Result<(), GenericError> {
            Ok(())
        }
    }

    #[test]
    fn default_stop_timeout() {
        assert_eq!(Idle.stop_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn deadline_errors_are_recognized_through_context() {
        let err: GenericError = TypedError::new(DEADLINE_EXCEEDED, "server did not drain in time").into();
        assert!(is_deadline_exceeded(&err));

        let err = Err::<(), _>(TypedError::new(DEADLINE_EXCEEDED, "server did not drain in time"))
            .error_context("Failed to stop server.")
            .unwrap_err();
        assert!(is_deadline_exceeded(&err));

        let err = generic_error!("connection reset");
        assert!(!is_deadline_exceeded(&err));
    }
}
