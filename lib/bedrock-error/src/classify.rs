//! Error classification.
//!
//! Classification answers the question "what kind of failure is this?" for arbitrary errors, including errors from
//! other crates that know nothing about [`ErrorType`].
//!
//! An error's type is determined by walking its `source()` chain from the outermost error towards the root cause, and
//! stopping at the first layer that either:
//!
//! - _declares_ its own type, by implementing [`Classified`] (always the case for [`TypedError`] and [`Sentinel`]), or
//! - has a _named_ concrete identity: a type registered with the [`Classifier`] under its type name, or under an
//!   explicit [`ErrorType`]
//!
//! Layers whose concrete type is _opaque_ (generic "just a message" errors such as [`Traced`], [`std::io::Error`] or
//! [`std::fmt::Error`]) are skipped, as are layers whose concrete type was never registered. If no layer yields a type,
//! the error is [`ErrorType::UNKNOWN`].
//!
//! Since `&dyn Error` can only be inspected by downcasting to a known concrete type, every capability beyond the
//! built-in types has to be registered explicitly, which is the job of [`Classifier`].
use std::{
    any::{type_name, TypeId},
    backtrace::Backtrace,
    error::Error as StdError,
    sync::OnceLock,
};

use crate::{traced::into_box_error, BoxError, ErrorType, Sentinel, Traced, TypedError};

static GLOBAL_CLASSIFIER: OnceLock<Classifier> = OnceLock::new();

/// An error that reports its own [`ErrorType`].
pub trait Classified {
    /// Returns the type of this error.
    fn error_type(&self) -> ErrorType;
}

/// An error that carries a stack trace.
pub trait StackTraced {
    /// Returns the stack trace captured when this error was created.
    fn stack_trace(&self) -> &Backtrace;
}

type DeclaredProbe = fn(&(dyn StdError + 'static)) -> Option<ErrorType>;
type StackProbe = for<'a> fn(&'a (dyn StdError + 'static)) -> Option<&'a Backtrace>;

#[derive(Clone, Debug)]
enum Identity {
    Named(ErrorType),
    Opaque,
}

#[derive(Clone)]
struct IdentityRule {
    type_id: TypeId,
    matches: fn(&(dyn StdError + 'static)) -> bool,
    identity: Identity,
}

fn declared_probe<E>(err: &(dyn StdError + 'static)) -> Option<ErrorType>
where
    E: Classified + StdError + 'static,
{
    err.downcast_ref::<E>().map(Classified::error_type)
}

fn identity_probe<E>(err: &(dyn StdError + 'static)) -> bool
where
    E: StdError + 'static,
{
    err.is::<E>()
}

fn stack_probe<'a, E>(err: &'a (dyn StdError + 'static)) -> Option<&'a Backtrace>
where
    E: StackTraced + StdError + 'static,
{
    err.downcast_ref::<E>().map(StackTraced::stack_trace)
}

/// Returns the bare name of `E`: the last path segment, without any generic parameters.
fn short_type_name<E: ?Sized>() -> &'static str {
    let full = type_name::<E>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics.rsplit("::").next().unwrap_or(without_generics)
}

/// A registry of error capabilities used to classify errors.
///
/// `Classifier::empty` knows only about the error types in this crate. `Classifier::default` additionally registers:
///
/// - the standard library's parse errors as named kinds (`ParseIntError`, `ParseFloatError`, `ParseBoolError`,
///   `Utf8Error`, `FromUtf8Error`, `AddrParseError`, `VarError`)
/// - [`std::io::Error`] and [`std::fmt::Error`] as opaque kinds
///
/// Registering the same concrete type again replaces its previous registration.
///
/// A process-wide classifier is used by the free functions in this crate ([`get_type`], [`find_original_stack_trace`],
/// [`is`]) and by [`TypedError::with_type_fallback`]. It defaults to `Classifier::default`, and a customized classifier
/// can be installed once, early during startup, via [`Classifier::install`].
#[derive(Clone)]
pub struct Classifier {
    declared: Vec<(TypeId, DeclaredProbe)>,
    identities: Vec<IdentityRule>,
    stack_traced: Vec<(TypeId, StackProbe)>,
}

impl Classifier {
    /// Creates a classifier that only knows about the error types in this crate.
    pub fn empty() -> Self {
        Self {
            declared: Vec::new(),
            identities: Vec::new(),
            stack_traced: Vec::new(),
        }
        .with_declared::<TypedError>()
        .with_declared::<Sentinel>()
        .with_opaque::<Traced>()
        .with_stack_traced::<TypedError>()
        .with_stack_traced::<Traced>()
    }

    /// Returns the process-wide classifier.
    pub fn global() -> &'static Classifier {
        GLOBAL_CLASSIFIER.get_or_init(Classifier::default)
    }

    /// Installs this classifier as the process-wide classifier.
    ///
    /// # Errors
    ///
    /// If the process-wide classifier was already installed, or was already used (which installs the default one), the
    /// classifier is handed back as the error value.
    pub fn install(self) -> Result<(), Classifier> {
        GLOBAL_CLASSIFIER.set(self)
    }

    /// Registers `E` as an error that declares its own type.
    pub fn with_declared<E>(mut self) -> Self
    where
        E: Classified + StdError + 'static,
    {
        let type_id = TypeId::of::<E>();
        self.declared.retain(|(existing, _)| *existing != type_id);
        self.declared.push((type_id, declared_probe::<E>));
        self
    }

    /// Registers `E` as a named kind, classified under its bare type name.
    ///
    /// For example, registering `std::num::ParseIntError` classifies it as `ParseIntError`.
    pub fn with_named<E>(self) -> Self
    where
        E: StdError + 'static,
    {
        self.with_named_as::<E>(ErrorType::from_static(short_type_name::<E>()))
    }

    /// Registers `E` as a named kind, classified under the given type.
    pub fn with_named_as<E>(self, error_type: impl Into<ErrorType>) -> Self
    where
        E: StdError + 'static,
    {
        self.with_identity::<E>(Identity::Named(error_type.into()))
    }

    /// Registers `E` as an opaque kind, which never names a type on its own.
    pub fn with_opaque<E>(self) -> Self
    where
        E: StdError + 'static,
    {
        self.with_identity::<E>(Identity::Opaque)
    }

    /// Registers `E` as an error that carries a stack trace.
    pub fn with_stack_traced<E>(mut self) -> Self
    where
        E: StackTraced + StdError + 'static,
    {
        let type_id = TypeId::of::<E>();
        self.stack_traced.retain(|(existing, _)| *existing != type_id);
        self.stack_traced.push((type_id, stack_probe::<E>));
        self
    }

    fn with_identity<E>(mut self, identity: Identity) -> Self
    where
        E: StdError + 'static,
    {
        let type_id = TypeId::of::<E>();
        self.identities.retain(|rule| rule.type_id != type_id);
        self.identities.push(IdentityRule {
            type_id,
            matches: identity_probe::<E>,
            identity,
        });
        self
    }

    /// Returns the type declared by `err` itself, if it declares one.
    ///
    /// Only the given error is inspected: its sources are not.
    pub fn declared_type(&self, err: &(dyn StdError + 'static)) -> Option<ErrorType> {
        self.declared.iter().find_map(|(_, probe)| probe(err))
    }

    fn named_type(&self, err: &(dyn StdError + 'static)) -> Option<ErrorType> {
        let rule = self.identities.iter().find(|rule| (rule.matches)(err))?;
        match &rule.identity {
            Identity::Named(error_type) => Some(error_type.clone()),
            Identity::Opaque => None,
        }
    }

    /// Returns the type of `err`.
    ///
    /// See the [module-level documentation][self] for how the type is determined.
    pub fn get_type(&self, err: &(dyn StdError + 'static)) -> ErrorType {
        let mut current = err;
        loop {
            if let Some(error_type) = self.declared_type(current) {
                return error_type;
            }

            if let Some(error_type) = self.named_type(current) {
                return error_type;
            }

            match current.source() {
                Some(source) => current = source,
                None => return ErrorType::UNKNOWN,
            }
        }
    }

    /// Returns the type of `err`, or [`ErrorType::NONE`] if there is no error.
    pub fn get_type_opt(&self, err: Option<&(dyn StdError + 'static)>) -> ErrorType {
        err.map_or(ErrorType::NONE, |err| self.get_type(err))
    }

    /// Returns the deepest stack trace in the `source()` chain of `err`.
    ///
    /// Every layer of the chain is visited, from `err` to its root cause, and the stack trace of the last layer carrying
    /// one is returned. This surfaces the trace closest to where the failure originated, even when outer layers captured
    /// traces of their own while wrapping it.
    pub fn find_original_stack_trace<'a>(&self, err: &'a (dyn StdError + 'static)) -> Option<&'a Backtrace> {
        let mut deepest = None;
        let mut current = Some(err);
        while let Some(layer) = current {
            if let Some(trace) = self.stack_traced.iter().find_map(|(_, probe)| probe(layer)) {
                deepest = Some(trace);
            }
            current = layer.source();
        }
        deepest
    }

    /// Returns `true` if any layer in the `source()` chain of `err` is identical to `target`.
    ///
    /// A layer is identical to `target` when it is the same object, when it is a [`TypedError`] matching `target` (see
    /// [`TypedError::is`]), or when both are equal [`Sentinel`]s.
    pub fn is(&self, err: &(dyn StdError + 'static), target: &(dyn StdError + 'static)) -> bool {
        let mut current = Some(err);
        while let Some(layer) = current {
            if same_object(layer, target) {
                return true;
            }

            if let Some(typed) = layer.downcast_ref::<TypedError>() {
                if self.typed_matches(typed, target) {
                    return true;
                }
            }

            if let (Some(a), Some(b)) = (layer.downcast_ref::<Sentinel>(), target.downcast_ref::<Sentinel>()) {
                if a == b {
                    return true;
                }
            }

            current = layer.source();
        }
        false
    }

    pub(crate) fn typed_matches(&self, typed: &TypedError, other: &(dyn StdError + 'static)) -> bool {
        match self.declared_type(other) {
            Some(other_type) if other_type == *typed.error_type() => {
                let ours = typed.to_string();
                let theirs = other.to_string();
                ours == theirs
                    || ours
                        .strip_prefix(theirs.as_str())
                        .is_some_and(|rest| rest.starts_with(": "))
            }
            _ => false,
        }
    }

    /// Classifies `err`, preferring any type it already has over `fallback`.
    ///
    /// A [`TypedError`] is returned unchanged. Otherwise, `err` is wrapped (with a stack trace) under its own type, or
    /// under `fallback` if its type is [`ErrorType::UNKNOWN`].
    pub fn with_type_fallback<E>(&self, err: E, fallback: impl Into<ErrorType>) -> TypedError
    where
        E: Into<BoxError> + 'static,
    {
        match into_box_error(err).downcast::<TypedError>() {
            Ok(typed) => *typed,
            Err(err) => {
                let current = self.get_type(&*err);
                let error_type = if current.is_unknown() { fallback.into() } else { current };
                TypedError::from_parts(Traced::with_stack(err), error_type)
            }
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::empty()
            .with_opaque::<std::io::Error>()
            .with_opaque::<std::fmt::Error>()
            .with_named::<std::num::ParseIntError>()
            .with_named::<std::num::ParseFloatError>()
            .with_named::<std::str::ParseBoolError>()
            .with_named::<std::str::Utf8Error>()
            .with_named::<std::string::FromUtf8Error>()
            .with_named::<std::net::AddrParseError>()
            .with_named::<std::env::VarError>()
    }
}

fn same_object(a: &(dyn StdError + 'static), b: &(dyn StdError + 'static)) -> bool {
    std::ptr::eq(a as *const dyn StdError as *const (), b as *const dyn StdError as *const ())
}

/// Returns the type of `err`, using the process-wide classifier.
///
/// See [`Classifier::get_type`].
pub fn get_type(err: &(dyn StdError + 'static)) -> ErrorType {
    Classifier::global().get_type(err)
}

/// Returns the type of `err`, or [`ErrorType::NONE`] if there is no error, using the process-wide classifier.
pub fn get_type_opt(err: Option<&(dyn StdError + 'static)>) -> ErrorType {
    Classifier::global().get_type_opt(err)
}

/// Returns the deepest stack trace in the `source()` chain of `err`, using the process-wide classifier.
///
/// This is meant for internal diagnostics, such as logging, and should never be rendered to users.
pub fn find_original_stack_trace<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a Backtrace> {
    Classifier::global().find_original_stack_trace(err)
}

/// Returns `true` if any layer in the `source()` chain of `err` is identical to `target`, using the process-wide
/// classifier.
pub fn is(err: &(dyn StdError + 'static), target: &(dyn StdError + 'static)) -> bool {
    Classifier::global().is(err, target)
}

#[cfg(test)]
mod tests {
    use std::{fmt, io};

    use super::*;
    use crate::{GenericError, TypedResultExt as _};

    #[derive(Debug)]
    struct CustomError;

    impl fmt::Display for CustomError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("I am a custom error!")
        }
    }

    impl StdError for CustomError {}

    #[derive(Debug)]
    struct DeclaringError;

    impl fmt::Display for DeclaringError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("I am a custom typed error")
        }
    }

    impl StdError for DeclaringError {}

    impl Classified for DeclaringError {
        fn error_type(&self) -> ErrorType {
            ErrorType::from_static("VerySpecificType")
        }
    }

    /// A foreign wrapper that neither declares a type nor carries a stack trace.
    #[derive(Debug)]
    struct Context {
        message: &'static str,
        source: BoxError,
    }

    impl Context {
        fn wrap<E: Into<BoxError>>(message: &'static str, source: E) -> Self {
            Self {
                message,
                source: source.into(),
            }
        }
    }

    impl fmt::Display for Context {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}: {}", self.message, self.source)
        }
    }

    impl StdError for Context {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&*self.source)
        }
    }

    fn test_classifier() -> Classifier {
        Classifier::default()
            .with_named::<CustomError>()
            .with_declared::<DeclaringError>()
    }

    fn plain_io_error() -> io::Error {
        io::Error::other("error!")
    }

    #[test]
    fn get_type_table() {
        let classifier = test_classifier();
        let parse_error = "nope".parse::<i32>().unwrap_err();

        let cases: Vec<(&str, BoxError, ErrorType)> = vec![
            ("io error", plain_io_error().into(), ErrorType::UNKNOWN),
            ("traced error", Traced::new("error!").into(), ErrorType::UNKNOWN),
            (
                "foreign wrapper around io error",
                Context::wrap("wrapped", plain_io_error()).into(),
                ErrorType::UNKNOWN,
            ),
            (
                "traced wrapper around io error",
                Traced::wrap(plain_io_error(), "wrapped").into(),
                ErrorType::UNKNOWN,
            ),
            ("named error", CustomError.into(), "CustomError".into()),
            (
                "traced wrapper around named error",
                Traced::wrap(CustomError, "wrapped").into(),
                "CustomError".into(),
            ),
            (
                "doubly wrapped named error",
                Traced::wrap(Context::wrap("wrapping", CustomError), "wrapped").into(),
                "CustomError".into(),
            ),
            (
                "typed error",
                TypedError::new("SpecialType", "some message").into(),
                "SpecialType".into(),
            ),
            (
                "wrapped typed error",
                Traced::wrap(TypedError::new("SpecialType", "some message"), "wrapped").into(),
                "SpecialType".into(),
            ),
            ("declaring error", DeclaringError.into(), "VerySpecificType".into()),
            (
                "wrapped declaring error",
                Traced::wrap(DeclaringError, "wrapped").into(),
                "VerySpecificType".into(),
            ),
            ("standard library parse error", parse_error.into(), "ParseIntError".into()),
            (
                "sentinel error",
                Sentinel::new(ErrorType::UNKNOWN, "danger!").into(),
                ErrorType::UNKNOWN,
            ),
            (
                "wrapped sentinel error",
                Traced::wrap(Sentinel::new(ErrorType::UNMARSHALLING, "danger!"), "wrapped").into(),
                ErrorType::UNMARSHALLING,
            ),
        ];

        for (name, err, expected) in cases {
            assert_eq!(classifier.get_type(&*err), expected, "case: {}", name);
        }
    }

    #[test]
    fn absent_error_has_no_type() {
        assert_eq!(test_classifier().get_type_opt(None), ErrorType::NONE);

        let err = CustomError;
        assert_eq!(test_classifier().get_type_opt(Some(&err)), "CustomError");
    }

    #[test]
    fn unregistered_types_are_opaque() {
        let classifier = Classifier::default();
        assert_eq!(classifier.get_type(&CustomError), ErrorType::UNKNOWN);
        assert_eq!(
            classifier.get_type(&Context::wrap("outer", DeclaringError)),
            ErrorType::UNKNOWN
        );
    }

    #[test]
    fn outermost_classification_wins() {
        let classifier = test_classifier();

        // A declared type on an outer layer beats a named type further in.
        let err = TypedError::wrap(CustomError, ErrorType::VALIDATION, "outer");
        assert_eq!(classifier.get_type(&err), ErrorType::VALIDATION);

        // A named type on an outer layer beats a declared type further in.
        #[derive(Debug)]
        struct NamedWrapper(TypedError);

        impl fmt::Display for NamedWrapper {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "named wrapper: {}", self.0)
            }
        }

        impl StdError for NamedWrapper {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let classifier = classifier.with_named_as::<NamedWrapper>("Outer");
        let err = NamedWrapper(TypedError::new(ErrorType::VALIDATION, "inner"));
        assert_eq!(classifier.get_type(&err), "Outer");
    }

    #[test]
    fn reregistration_replaces_previous_identity() {
        let classifier = test_classifier().with_opaque::<CustomError>();
        assert_eq!(classifier.get_type(&CustomError), ErrorType::UNKNOWN);

        let classifier = classifier.with_named_as::<CustomError>("Custom");
        assert_eq!(classifier.get_type(&CustomError), "Custom");
    }

    #[test]
    fn short_type_names() {
        assert_eq!(short_type_name::<std::num::ParseIntError>(), "ParseIntError");
        assert_eq!(short_type_name::<CustomError>(), "CustomError");
        assert_eq!(short_type_name::<Vec<std::num::ParseIntError>>(), "Vec");
    }

    #[test]
    fn with_type_fallback_table() {
        let classifier = test_classifier();
        let fallback = ErrorType::from_static("fallback!");

        let cases: Vec<(&str, BoxError, ErrorType)> = vec![
            ("io error", plain_io_error().into(), fallback.clone()),
            ("traced error", Traced::new("error!").into(), fallback.clone()),
            (
                "foreign wrapper around io error",
                Context::wrap("wrapped", plain_io_error()).into(),
                fallback.clone(),
            ),
            ("named error", CustomError.into(), "CustomError".into()),
            (
                "doubly wrapped named error",
                Traced::wrap(Context::wrap("wrapping", CustomError), "wrapped").into(),
                "CustomError".into(),
            ),
            (
                "typed error",
                TypedError::new("SpecialType", "some message").into(),
                "SpecialType".into(),
            ),
            (
                "wrapped typed error",
                Traced::wrap(TypedError::new("SpecialType", "some message"), "wrapped").into(),
                "SpecialType".into(),
            ),
            ("declaring error", DeclaringError.into(), "VerySpecificType".into()),
            (
                "sentinel error",
                Sentinel::new(ErrorType::UNMARSHALLING, "danger!").into(),
                ErrorType::UNMARSHALLING,
            ),
            (
                "unknown sentinel error",
                Sentinel::new(ErrorType::UNKNOWN, "danger!").into(),
                fallback.clone(),
            ),
        ];

        for (name, err, expected) in cases {
            let typed = classifier.with_type_fallback(err, fallback.clone());
            assert_eq!(classifier.get_type(&typed), expected, "case: {}", name);
        }
    }

    #[test]
    fn with_type_fallback_returns_typed_errors_unchanged() {
        let original = TypedError::new(ErrorType::VALIDATION, "bad input");
        let original_trace = original.stack_trace() as *const Backtrace;

        let result = test_classifier().with_type_fallback(original, ErrorType::CONFIGURATION);
        assert_eq!(*result.error_type(), ErrorType::VALIDATION);
        assert!(std::ptr::eq(result.stack_trace(), original_trace));
    }

    #[test]
    fn stack_trace_absent_without_traced_layers() {
        let classifier = test_classifier();
        assert!(classifier.find_original_stack_trace(&plain_io_error()).is_none());
        assert!(classifier
            .find_original_stack_trace(&Context::wrap("wrapped", CustomError))
            .is_none());
    }

    #[test]
    fn stack_trace_of_unwrapped_errors() {
        let classifier = test_classifier();

        let traced = Traced::new("test error");
        let found = classifier.find_original_stack_trace(&traced).unwrap();
        assert!(std::ptr::eq(found, traced.stack_trace()));

        let typed = TypedError::new(ErrorType::VALIDATION, "test error");
        let found = classifier.find_original_stack_trace(&typed).unwrap();
        assert!(std::ptr::eq(found, typed.stack_trace()));
    }

    #[test]
    fn stack_trace_comes_from_deepest_traced_layer() {
        let classifier = test_classifier();

        // Foreign wrapper around a traced root.
        let err = Context::wrap("wrapped", Traced::new("test error"));
        let root = err.source.downcast_ref::<Traced>().unwrap();
        let found = classifier.find_original_stack_trace(&err).unwrap();
        assert!(std::ptr::eq(found, root.stack_trace()));

        // Three layers, each but the outermost carrying its own trace.
        let err = Context::wrap(
            "wrapped yet again",
            TypedError::wrap(
                Traced::wrap(Traced::new("original"), "wrapped"),
                ErrorType::VALIDATION,
                "wrapped again",
            ),
        );
        let mut layer: &(dyn StdError + 'static) = &err;
        let mut root = None;
        while let Some(source) = layer.source() {
            if let Some(traced) = source.downcast_ref::<Traced>() {
                root = Some(traced.stack_trace());
            }
            layer = source;
        }
        let root = root.unwrap();
        assert_eq!(layer.to_string(), "original");
        let found = classifier.find_original_stack_trace(&err).unwrap();
        assert!(std::ptr::eq(found, root));
    }

    #[test]
    fn stack_trace_skips_untraced_root() {
        let classifier = test_classifier();

        let second = Traced::wrap(plain_io_error(), "wrapped");
        let second_trace = second.stack_trace() as *const Backtrace;
        let err = Context::wrap(
            "wrapped yet again",
            TypedError::wrap(second, ErrorType::VALIDATION, "wrapped again"),
        );

        let found = classifier.find_original_stack_trace(&err).unwrap();
        assert!(std::ptr::eq(found, second_trace));
    }

    #[test]
    fn is_walks_the_chain() {
        static NOT_FOUND: Sentinel = Sentinel::new(ErrorType::VALIDATION, "record not found");
        let classifier = test_classifier();

        let err = Context::wrap("lookup failed", NOT_FOUND.with_stack());
        assert!(classifier.is(&err, &NOT_FOUND));

        let err = Context::wrap("lookup failed", NOT_FOUND.clone());
        assert!(classifier.is(&err, &NOT_FOUND));

        let other = Sentinel::new(ErrorType::VALIDATION, "record exists");
        assert!(!classifier.is(&err, &other));

        let io_err = plain_io_error();
        assert!(classifier.is(&io_err, &io_err));
        assert!(!classifier.is(&io_err, &plain_io_error()));
    }

    #[test]
    fn generic_errors_keep_their_type_under_fallback() {
        let err = GenericError::from(TypedError::new(ErrorType::VALIDATION, "bad input"));
        let typed = TypedError::with_type_fallback(err, ErrorType::CONFIGURATION);
        assert_eq!(*typed.error_type(), ErrorType::VALIDATION);
        assert_eq!(typed.to_string(), "bad input");

        let result: Result<(), GenericError> = Err(TypedError::new(ErrorType::VALIDATION, "bad input").into());
        let typed = result.with_type_fallback(ErrorType::CONFIGURATION).unwrap_err();
        assert_eq!(*typed.error_type(), ErrorType::VALIDATION);

        let err = GenericError::from(TypedError::new(ErrorType::VALIDATION, "bad input")).context("while validating");
        let typed = TypedError::with_type_fallback(err, ErrorType::CONFIGURATION);
        assert_eq!(*typed.error_type(), ErrorType::VALIDATION);
        assert_eq!(typed.to_string(), "while validating");

        let err = GenericError::from(plain_io_error());
        let typed = TypedError::with_type_fallback(err, ErrorType::CONFIGURATION);
        assert_eq!(*typed.error_type(), ErrorType::CONFIGURATION);
    }

    #[test]
    fn stack_trace_found_through_generic_errors() {
        let root = TypedError::new(ErrorType::VALIDATION, "bad input");
        let root_trace = root.stack_trace() as *const Backtrace;
        let err = TypedError::wrap(GenericError::from(root), ErrorType::CONFIGURATION, "while loading");
        let found = find_original_stack_trace(&err).unwrap();
        assert!(std::ptr::eq(found, root_trace));

        let root = Traced::new("bad input");
        let root_trace = root.stack_trace() as *const Backtrace;
        let err = Traced::wrap(GenericError::from(root).context("while parsing"), "while loading");
        let found = find_original_stack_trace(&err).unwrap();
        assert!(std::ptr::eq(found, root_trace));
    }

    #[test]
    fn is_sees_through_generic_errors() {
        static NOT_FOUND: Sentinel = Sentinel::new(ErrorType::VALIDATION, "record not found");

        let err = TypedError::wrap(
            GenericError::from(NOT_FOUND.with_stack()),
            ErrorType::CONFIGURATION,
            "lookup failed",
        );
        assert!(is(&err, &NOT_FOUND));

        let err = Traced::wrap(GenericError::from(NOT_FOUND.clone()).context("lookup failed"), "outer");
        assert!(is(&err, &NOT_FOUND));

        let err = Traced::wrap(GenericError::from(plain_io_error()), "outer");
        assert!(!is(&err, &NOT_FOUND));
    }
}
