use std::{any::Any, backtrace::Backtrace, error::Error as StdError, fmt};

use crate::{GenericError, TypedError};

/// A boxed, thread-safe error.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// An error that carries the stack trace captured where it was created.
///
/// `Traced` is the base error for everything in this crate that needs a stack trace. It comes in three shapes:
///
/// - a bare message ([`Traced::new`])
/// - an existing error with a stack trace attached ([`Traced::with_stack`]), which renders exactly like the error it
///   wraps
/// - an existing error with a context message prepended ([`Traced::wrap`]), which renders as `"<message>: <cause>"`
///
/// The stack trace is captured with [`Backtrace::capture`], and so follows the usual `RUST_BACKTRACE` /
/// `RUST_LIB_BACKTRACE` environment variables: when capturing is disabled, the trace is still present but empty. The
/// trace lives on the heap, so a reference to it identifies the same trace for as long as the error lives, even if the
/// error itself is moved.
///
/// `Traced` never names a failure category on its own, and is treated as an opaque kind during classification.
pub struct Traced {
    message: Option<String>,
    cause: Option<BoxError>,
    backtrace: Box<Backtrace>,
}

impl Traced {
    /// Creates a new `Traced` error with the given message.
    pub fn new<M: fmt::Display>(message: M) -> Self {
        Self {
            message: Some(message.to_string()),
            cause: None,
            backtrace: Box::new(Backtrace::capture()),
        }
    }

    /// Attaches a stack trace to `cause` without altering how it is rendered.
    pub fn with_stack<E>(cause: E) -> Self
    where
        E: Into<BoxError> + 'static,
    {
        Self {
            message: None,
            cause: Some(into_box_error(cause)),
            backtrace: Box::new(Backtrace::capture()),
        }
    }

    /// Wraps `cause` with a context message, and attaches a stack trace.
    pub fn wrap<E, M>(cause: E, message: M) -> Self
    where
        E: Into<BoxError> + 'static,
        M: fmt::Display,
    {
        Self {
            message: Some(message.to_string()),
            cause: Some(into_box_error(cause)),
            backtrace: Box::new(Backtrace::capture()),
        }
    }

    /// Returns the stack trace captured when this error was created.
    pub fn stack_trace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Returns the wrapped cause, if any.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for Traced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.cause) {
            (Some(message), Some(cause)) => write!(f, "{}: {}", message, cause),
            (Some(message), None) => f.write_str(message),
            (None, Some(cause)) => write!(f, "{}", cause),
            (None, None) => Ok(()),
        }
    }
}

impl fmt::Debug for Traced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)?;
        write_backtrace(f, &self.backtrace)
    }
}

impl StdError for Traced {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Boxes `err`, keeping the error held by a [`GenericError`] reachable through `source()`.
///
/// Boxing a `GenericError` directly goes through `anyhow`, whose box reports the `source()` of the error it holds rather
/// than that error itself, so a typed error inside it would be skipped during classification. A `GenericError` holding
/// a bare [`TypedError`] is unwrapped instead, and any other `GenericError` is boxed as a [`GenericCause`].
pub(crate) fn into_box_error<E>(err: E) -> BoxError
where
    E: Into<BoxError> + 'static,
{
    let mut slot = Some(err);
    if let Some(generic) = (&mut slot as &mut dyn Any)
        .downcast_mut::<Option<GenericError>>()
        .and_then(Option::take)
    {
        return from_generic(generic);
    }

    match slot {
        Some(err) => err.into(),
        // `slot` is only emptied by the branch above, which returns.
        None => Box::new(Traced::new("")),
    }
}

fn from_generic(err: GenericError) -> BoxError {
    let outermost: &(dyn StdError + 'static) = err.as_ref();
    let holds_typed = err.downcast_ref::<TypedError>().is_some_and(|typed| {
        std::ptr::eq(
            typed as *const TypedError as *const (),
            outermost as *const dyn StdError as *const (),
        )
    });

    // `downcast` also sees through context layers, so only unwrap when the typed error is the outermost one.
    if holds_typed {
        match err.downcast::<TypedError>() {
            Ok(typed) => Box::new(typed),
            Err(err) => Box::new(GenericCause(err)),
        }
    } else {
        Box::new(GenericCause(err))
    }
}

/// A [`GenericError`] held as the cause of another error.
///
/// Renders like the generic error, and exposes the outermost error it holds as its source.
struct GenericCause(GenericError);

impl fmt::Display for GenericCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for GenericCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl StdError for GenericCause {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref())
    }
}

pub(crate) fn write_backtrace(f: &mut fmt::Formatter<'_>, backtrace: &Backtrace) -> fmt::Result {
    use std::backtrace::BacktraceStatus;

    if backtrace.status() == BacktraceStatus::Captured {
        write!(f, "\n\nStack backtrace:\n{}", backtrace)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn renders_each_shape() {
        assert_eq!(Traced::new("bad input").to_string(), "bad input");

        let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
        let eof_text = eof.to_string();
        assert_eq!(Traced::with_stack(eof).to_string(), eof_text);

        let wrapped = Traced::wrap(Traced::new("root"), "outer");
        assert_eq!(wrapped.to_string(), "outer: root");
    }

    #[test]
    fn source_is_the_cause() {
        let wrapped = Traced::wrap(Traced::new("root"), "outer");
        let source = wrapped.source().expect("wrapped error should have a source");
        assert_eq!(source.to_string(), "root");
        assert!(source.is::<Traced>());

        assert!(Traced::new("root").source().is_none());
    }

    #[test]
    fn generic_causes_keep_the_error_they_hold() {
        let typed = TypedError::new(crate::ErrorType::VALIDATION, "bad input");
        let wrapped = Traced::wrap(GenericError::from(typed), "outer");
        assert_eq!(wrapped.to_string(), "outer: bad input");
        assert!(wrapped.source().is_some_and(|source| source.is::<TypedError>()));

        let generic = GenericError::from(io::Error::other("eof")).context("reading");
        let wrapped = Traced::with_stack(generic);
        assert_eq!(wrapped.to_string(), "reading");

        let held = wrapped.source().and_then(StdError::source).expect("generic cause should expose its error");
        assert_eq!(held.to_string(), "reading");
        assert!(held.source().is_some_and(|source| source.is::<io::Error>()));
    }
}
