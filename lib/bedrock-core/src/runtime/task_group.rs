use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, PoisonError},
};

use bedrock_error::GenericError;
use futures::FutureExt as _;
use snafu::Snafu;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info_span, Instrument as _};

use super::ServiceContext;

/// Task errors.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum TaskError {
    /// The task returned an error.
    #[snafu(display("Task '{}' failed: {}", task_name, source))]
    Failed {
        /// Name of the task.
        task_name: String,

        /// The error returned by the task.
        source: GenericError,
    },

    /// The task panicked.
    #[snafu(display("Task '{}' panicked: {}", task_name, message))]
    Panicked {
        /// Name of the task.
        task_name: String,

        /// The panic message, if the panic payload was a string.
        message: String,
    },
}

impl TaskError {
    /// Returns the name of the task that failed.
    pub fn task_name(&self) -> &str {
        match self {
            Self::Failed { task_name, .. } | Self::Panicked { task_name, .. } => task_name,
        }
    }
}

/// A group of background tasks sharing a cancellation signal.
///
/// Tasks are spawned onto the current Tokio runtime with [`spawn`][Self::spawn], which never blocks. The first task to
/// fail, either by returning an error or by panicking, has its error recorded and cancels the group's context, which is
/// a child of the context the group was created from. Later failures are logged, but not recorded.
///
/// [`wait`][Self::wait] waits for every task spawned so far, and returns the first recorded error.
///
/// `TaskGroup` is cheaply cloneable, and all clones refer to the same group, so tasks can spawn further tasks into the
/// group they belong to.
#[derive(Clone)]
pub struct TaskGroup {
    tracker: TaskTracker,
    context: ServiceContext,
    first_error: Arc<Mutex<Option<TaskError>>>,
}

impl TaskGroup {
    /// Creates a new `TaskGroup` whose context is a child of `parent`.
    pub fn new(parent: &ServiceContext) -> Self {
        Self {
            tracker: TaskTracker::new(),
            context: ServiceContext::from_token(parent.token().child_token()),
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the group's context.
    ///
    /// The context is cancelled when the parent context is cancelled, or when any task in the group fails.
    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Returns the number of tasks that are still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    /// Returns `true` if no tasks are running.
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Spawns a task into the group.
    ///
    /// The task runs inside an `INFO`-level `task` span carrying its name, so events logged by the task carry the name
    /// at the default log level too.
    pub fn spawn<N, F>(&self, name: N, future: F)
    where
        N: Into<String>,
        F: Future<Output = Result<(), GenericError>> + Send + 'static,
    {
        let task_name = name.into();
        let span = info_span!("task", task_name = %task_name);
        let token = self.context.token().clone();
        let first_error = Arc::clone(&self.first_error);

        debug!(task_name = %task_name, "Spawning task.");

        self.tracker.spawn(
            async move {
                let error = match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(Ok(())) => {
                        debug!("Task completed.");
                        return;
                    }
                    Ok(Err(source)) => TaskError::Failed { task_name, source },
                    Err(payload) => TaskError::Panicked {
                        task_name,
                        message: panic_message(payload.as_ref()),
                    },
                };

                let mut first_error = first_error.lock().unwrap_or_else(PoisonError::into_inner);
                if first_error.is_none() {
                    error!(error = %error, "Task failed. Cancelling task group.");
                    *first_error = Some(error);
                } else {
                    debug!(error = %error, "Task failed after the task group was already cancelled.");
                }
                drop(first_error);

                token.cancel();
            }
            .instrument(span),
        );
    }

    /// Waits for every task in the group to finish, and returns the first error encountered, if any.
    ///
    /// No further tasks should be spawned once waiting has started: tasks spawned afterwards are still run, but may not
    /// be waited for.
    ///
    /// # Errors
    ///
    /// If any task failed, the first recorded failure is returned.
    pub async fn wait(&self) -> Result<(), TaskError> {
        self.tracker.close();
        self.tracker.wait().await;

        match self.first_error.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
