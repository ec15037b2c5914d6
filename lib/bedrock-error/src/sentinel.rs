use std::{borrow::Cow, error::Error as StdError, fmt};

use crate::{classify::Classified, BoxError, ErrorType, Traced, TypedError};

/// A fixed, comparable error value.
///
/// Sentinels are meant to be declared once, typically as a `static`, and then compared against errors returned from
/// fallible operations. They carry no stack trace of their own: a sentinel value is shared by every failure it
/// represents, so a stack trace would only ever point at the declaration.
///
/// To return a sentinel from an operation, use [`Sentinel::with_stack`] to stamp a fresh copy with a stack trace, or
/// [`Sentinel::from_error`] to use it as context for an underlying cause. Both of the resulting errors match the sentinel
/// when checked with [`is`][crate::is]:
///
/// ```
/// use bedrock_error::{is, ErrorType, Sentinel};
///
/// static NOT_FOUND: Sentinel = Sentinel::new(ErrorType::VALIDATION, "record not found");
///
/// let err = NOT_FOUND.with_stack();
/// assert!(is(&err, &NOT_FOUND));
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Sentinel {
    error_type: ErrorType,
    message: Cow<'static, str>,
}

impl Sentinel {
    /// Creates a new `Sentinel` with the given type and message.
    pub const fn new(error_type: ErrorType, message: &'static str) -> Self {
        Self {
            error_type,
            message: Cow::Borrowed(message),
        }
    }

    /// Creates a new `Sentinel` with the given type and a message built at runtime.
    pub fn from_message<T, M>(error_type: T, message: M) -> Self
    where
        T: Into<ErrorType>,
        M: Into<String>,
    {
        Self {
            error_type: error_type.into(),
            message: Cow::Owned(message.into()),
        }
    }

    /// Returns the type of this sentinel.
    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }

    /// Returns the message of this sentinel.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creates a copy of this sentinel with a stack trace captured at the call site.
    pub fn with_stack(&self) -> TypedError {
        TypedError::from_parts(Traced::new(&self.message), self.error_type.clone())
    }

    /// Wraps `cause` with this sentinel's message, tagged with this sentinel's type.
    ///
    /// The resulting error renders as `"<message>: <cause>"`.
    pub fn from_error<E>(&self, cause: E) -> TypedError
    where
        E: Into<BoxError> + 'static,
    {
        TypedError::wrap(cause, self.error_type.clone(), &self.message)
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Sentinel {}

impl Classified for Sentinel {
    fn error_type(&self) -> ErrorType {
        self.error_type.clone()
    }
}
