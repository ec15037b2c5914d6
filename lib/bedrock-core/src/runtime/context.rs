use tokio_util::sync::{CancellationToken, WaitForCancellationFuture, WaitForCancellationFutureOwned};

/// A shared cancellation signal for services and their background tasks.
///
/// Every service started by a supervisor receives the same `ServiceContext`, which is cancelled once all services have
/// been stopped, or as soon as a background task fails. Background work is expected to finish promptly after the
/// context is cancelled.
///
/// Cancellation is one-way: once cancelled, a context stays cancelled. Contexts can be nested with
/// [`child`][Self::child], where cancelling a parent cancels all of its children, but not the other way around.
#[derive(Clone, Debug)]
pub struct ServiceContext {
    token: CancellationToken,
}

/// A handle to cancel a [`ServiceContext`].
///
/// The context is cancelled when the handle is triggered, or dropped.
#[derive(Debug)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl ServiceContext {
    /// Creates a new root `ServiceContext` and `CancelHandle` pair.
    pub fn paired() -> (Self, CancelHandle) {
        let token = CancellationToken::new();
        let handle = CancelHandle { token: token.clone() };
        (Self { token }, handle)
    }

    /// Creates a child context.
    ///
    /// The child is cancelled when this context is cancelled, and can also be cancelled on its own via the returned
    /// handle without affecting this context.
    pub fn child(&self) -> (Self, CancelHandle) {
        let token = self.token.child_token();
        let handle = CancelHandle { token: token.clone() };
        (Self { token }, handle)
    }

    /// Returns `true` if the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits for the context to be cancelled.
    ///
    /// Resolves immediately if the context has already been cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Waits for the context to be cancelled, without borrowing it.
    ///
    /// This is useful for background tasks that need a `'static` future.
    pub fn cancelled_owned(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }

    pub(crate) fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl CancelHandle {
    /// Cancels the context.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Returns `true` if the context has been cancelled.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
