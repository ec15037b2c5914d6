//! Typed errors.
//!
//! This crate provides two complementary ways of working with errors:
//!
//! - [`GenericError`], an opaque, context-carrying error for code paths where the kind of failure does not matter to the
//!   caller, along with the [`generic_error!`] macro and the [`ErrorContext`] extension trait
//! - [`TypedError`], an error tagged with an [`ErrorType`] (a failure category) and carrying a stack trace, for code paths
//!   where callers need to branch on, or report, the kind of failure
//!
//! Any error can be classified with [`get_type`], which walks the error's `source()` chain looking for a layer that
//! declares or names a type. The deepest stack trace in an error chain can be found with [`find_original_stack_trace`].
//! Both rely on a [`Classifier`], which knows which concrete error types declare a type, name one, or carry a stack
//! trace.
#![deny(warnings)]
#![deny(missing_docs)]

use std::fmt::Display;

mod classify;
pub use self::classify::{find_original_stack_trace, get_type, get_type_opt, is, Classified, Classifier, StackTraced};

mod error_type;
pub use self::error_type::ErrorType;

mod sentinel;
pub use self::sentinel::Sentinel;

mod traced;
pub use self::traced::{BoxError, Traced};

mod typed;
pub use self::typed::{TypedError, TypedResultExt};

/// A generic error.
pub type GenericError = anyhow::Error;

/// Macro for constructing a generic error.
///
/// The resulting value evaulates to [`GenericError`], and can be construct from a string literal, a format string (with
/// arguments accepted, in the same order as `std::format!`), or a value which implements `Debug` and `Display`, such as
/// an existing error that implements `std::error::Error`.
///
/// When the value given implements `std::error::Error`, the source of the existing error value will be used as the source
/// of the error created by this macro.
#[macro_export]
macro_rules! generic_error {
    // This macro forwards to the [`anyhow::anyhow`] macro, and is intended to be used in place of that macro. We simply
    // use our own macro, instead of re-exporting it, so that we can provide better documentation that isn't
    // `anyhow`-specific.
    ($msg:literal $(,)?) => { $crate::_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::_anyhow!($fmt, $($arg)*) };
}

/// Macro for constructing a typed error.
///
/// The first argument is the error type (anything convertible to [`ErrorType`]), and the remaining arguments are a format
/// string and its arguments, in the same form as `std::format!`.
///
/// ```
/// use bedrock_error::{typed_error, ErrorType};
///
/// let key = "PORT";
/// let err = typed_error!(ErrorType::VALIDATION, "missing required env key: {}", key);
/// assert_eq!(err.to_string(), "missing required env key: PORT");
/// ```
#[macro_export]
macro_rules! typed_error {
    ($ty:expr, $($arg:tt)+) => {
        $crate::TypedError::new($ty, ::std::format!($($arg)+))
    };
}

/// Macro for wrapping an existing error in a typed error with a formatted context message.
///
/// The arguments are the error to wrap, the error type, and then a format string and its arguments, in the same form as
/// `std::format!`.
#[macro_export]
macro_rules! wrap_error {
    ($err:expr, $ty:expr, $($arg:tt)+) => {
        $crate::TypedError::wrap($err, $ty, ::std::format!($($arg)+))
    };
}

#[doc(hidden)]
pub use anyhow::anyhow as _anyhow;

pub(crate) mod private {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

// NOTE: We're wrapping `anyhow::Context` because otherwise the extension methods overlap with `snafu::ResultExt`, and
// this is just easier for scenarios where we want both.
/// Generic error context helpers for `Result`.
pub trait ErrorContext<T, E>: private::Sealed {
    /// Wrap the error value with additional context.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wrap the error value with additional context that is evaluated lazily only once an error does occur.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        <Self as anyhow::Context<T, E>>::context(self, context)
    }

    fn with_error_context<C, F>(self, context: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        <Self as anyhow::Context<T, E>>::with_context(self, context)
    }
}
