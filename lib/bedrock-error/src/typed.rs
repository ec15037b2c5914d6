use std::{backtrace::Backtrace, error::Error as StdError, fmt};

use crate::{
    classify::{Classified, Classifier, StackTraced},
    traced::{into_box_error, write_backtrace},
    BoxError, ErrorType, Traced,
};

/// An error tagged with an [`ErrorType`].
///
/// `TypedError` pairs a [`Traced`] error (and so a stack trace) with a failure category. It is transparent: it renders
/// exactly like the error it wraps, and reports the same `source()`.
///
/// Constructing a `TypedError` from an error that is already a `TypedError` of the same type does not add another layer:
/// the original error is returned unchanged.
pub struct TypedError {
    inner: Traced,
    error_type: ErrorType,
}

impl TypedError {
    pub(crate) fn from_parts(inner: Traced, error_type: ErrorType) -> Self {
        Self { inner, error_type }
    }

    /// Creates a new `TypedError` with the given type and message.
    pub fn new<T, M>(error_type: T, message: M) -> Self
    where
        T: Into<ErrorType>,
        M: fmt::Display,
    {
        Self::from_parts(Traced::new(message), error_type.into())
    }

    /// Tags `err` with the given type.
    ///
    /// If `err` is already a `TypedError` of the same type, it is returned unchanged. Otherwise, `err` is wrapped, with a
    /// stack trace, and renders exactly as it did before.
    pub fn with_type<E, T>(err: E, error_type: T) -> Self
    where
        E: Into<BoxError> + 'static,
        T: Into<ErrorType>,
    {
        let error_type = error_type.into();
        match into_box_error(err).downcast::<TypedError>() {
            Ok(typed) if typed.error_type == error_type => *typed,
            Ok(typed) => {
                let cause: BoxError = typed;
                Self::from_parts(Traced::with_stack(cause), error_type)
            }
            Err(err) => Self::from_parts(Traced::with_stack(err), error_type),
        }
    }

    /// Tags `err` with its own type, or with `fallback` if its type cannot be determined.
    ///
    /// Classification uses the process-wide [`Classifier`]. See [`Classifier::with_type_fallback`].
    pub fn with_type_fallback<E, T>(err: E, fallback: T) -> Self
    where
        E: Into<BoxError> + 'static,
        T: Into<ErrorType>,
    {
        Classifier::global().with_type_fallback(err, fallback)
    }

    /// Wraps `err` with a context message, and tags the result with the given type.
    ///
    /// The resulting error renders as `"<message>: <err>"`.
    pub fn wrap<E, T, M>(err: E, error_type: T, message: M) -> Self
    where
        E: Into<BoxError> + 'static,
        T: Into<ErrorType>,
        M: fmt::Display,
    {
        Self::from_parts(Traced::wrap(err, message), error_type.into())
    }

    /// Returns the type of this error.
    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }

    /// Returns the stack trace captured when this error was created.
    pub fn stack_trace(&self) -> &Backtrace {
        self.inner.stack_trace()
    }

    /// Returns the wrapped error, without its type.
    pub fn inner(&self) -> &Traced {
        &self.inner
    }

    /// Consumes this error, returning the wrapped error without its type.
    pub fn into_inner(self) -> Traced {
        self.inner
    }

    /// Returns `true` if `other` has the same type as this error, and this error's message is `other`'s message, or
    /// starts with `other`'s message followed by `": "`.
    ///
    /// The type of `other` is only considered if `other` declares it directly, as [`TypedError`] and [`Sentinel`] do.
    /// This makes a stamped copy of a sentinel, or a sentinel wrapping some cause, match the sentinel itself.
    ///
    /// [`Sentinel`]: crate::Sentinel
    pub fn is(&self, other: &(dyn StdError + 'static)) -> bool {
        Classifier::global().typed_matches(self, other)
    }
}

impl fmt::Display for TypedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for TypedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [type: {}]", self.inner, self.error_type)?;
        write_backtrace(f, self.inner.stack_trace())
    }
}

impl StdError for TypedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

impl Classified for TypedError {
    fn error_type(&self) -> ErrorType {
        self.error_type.clone()
    }
}

impl StackTraced for TypedError {
    fn stack_trace(&self) -> &Backtrace {
        self.inner.stack_trace()
    }
}

impl StackTraced for Traced {
    fn stack_trace(&self) -> &Backtrace {
        Traced::stack_trace(self)
    }
}

/// Typed error helpers for `Result`.
///
/// These mirror the constructors on [`TypedError`], and leave `Ok` values untouched: a successful result never gains a
/// type, a stack trace, or a context message.
pub trait TypedResultExt<T>: crate::private::Sealed {
    /// Tags the error with the given type.
    ///
    /// See [`TypedError::with_type`].
    fn with_type<Ty>(self, error_type: Ty) -> Result<T, TypedError>
    where
        Ty: Into<ErrorType>;

    /// Tags the error with its own type, or with `fallback` if its type cannot be determined.
    ///
    /// See [`TypedError::with_type_fallback`].
    fn with_type_fallback<Ty>(self, fallback: Ty) -> Result<T, TypedError>
    where
        Ty: Into<ErrorType>;

    /// Wraps the error with a context message, and tags the result with the given type.
    ///
    /// See [`TypedError::wrap`].
    fn wrap_err<Ty, M>(self, error_type: Ty, message: M) -> Result<T, TypedError>
    where
        Ty: Into<ErrorType>,
        M: fmt::Display;

    /// Wraps the error with a lazily-evaluated context message, and tags the result with the given type.
    fn wrap_err_with<Ty, M, F>(self, error_type: Ty, message: F) -> Result<T, TypedError>
    where
        Ty: Into<ErrorType>,
        M: fmt::Display,
        F: FnOnce() -> M;
}

impl<T, E> TypedResultExt<T> for Result<T, E>
where
    E: Into<BoxError> + 'static,
{
    fn with_type<Ty>(self, error_type: Ty) -> Result<T, TypedError>
    where
        Ty: Into<ErrorType>,
    {
        self.map_err(|e| TypedError::with_type(e, error_type))
    }

    fn with_type_fallback<Ty>(self, fallback: Ty) -> Result<T, TypedError>
    where
        Ty: Into<ErrorType>,
    {
        self.map_err(|e| TypedError::with_type_fallback(e, fallback))
    }

    fn wrap_err<Ty, M>(self, error_type: Ty, message: M) -> Result<T, TypedError>
    where
        Ty: Into<ErrorType>,
        M: fmt::Display,
    {
        self.map_err(|e| TypedError::wrap(e, error_type, message))
    }

    fn wrap_err_with<Ty, M, F>(self, error_type: Ty, message: F) -> Result<T, TypedError>
    where
        Ty: Into<ErrorType>,
        M: fmt::Display,
        F: FnOnce() -> M,
    {
        self.map_err(|e| TypedError::wrap(e, error_type, message()))
    }
}
