use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};

/// A failure category.
///
/// `ErrorType` is an open-ended string tag: there is no registry of valid types, and any string is a valid tag. Two error
/// types are equal if, and only if, their strings are equal.
///
/// A set of common, high-level error types is provided as associated constants, which can be used both when constructing
/// new errors and when checking the type of an existing error. Additional types can be declared in `const` context via
/// [`ErrorType::from_static`]:
///
/// ```
/// use bedrock_error::ErrorType;
///
/// const RATE_LIMITED: ErrorType = ErrorType::from_static("RateLimited");
/// assert_eq!(RATE_LIMITED.as_str(), "RateLimited");
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorType(Cow<'static, str>);

impl ErrorType {
    /// The type of an absent error.
    ///
    /// This is the empty string, and is distinct from [`ErrorType::UNKNOWN`], which is the type of an error that exists
    /// but whose category could not be determined.
    pub const NONE: ErrorType = ErrorType::from_static("");

    /// The category of the error could not be determined.
    pub const UNKNOWN: ErrorType = ErrorType::from_static("Unknown");

    /// Invalid or missing configuration.
    pub const CONFIGURATION: ErrorType = ErrorType::from_static("Configuration");

    /// Data could not be decoded.
    pub const UNMARSHALLING: ErrorType = ErrorType::from_static("Unmarshalling");

    /// Data could not be encoded.
    pub const MARSHALLING: ErrorType = ErrorType::from_static("Marshalling");

    /// Input failed validation.
    pub const VALIDATION: ErrorType = ErrorType::from_static("Validation");

    /// A value could not be parsed as a number.
    pub const INVALID_NUMBER: ErrorType = ErrorType::from_static("InvalidNumber");

    /// A value could not be parsed as a boolean.
    pub const INVALID_BOOLEAN: ErrorType = ErrorType::from_static("InvalidBoolean");

    /// Creates a new `ErrorType` from a static string.
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the type of an absent error.
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if this is [`ErrorType::UNKNOWN`].
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ErrorType {
    fn from(tag: &'static str) -> Self {
        Self::from_static(tag)
    }
}

impl From<String> for ErrorType {
    fn from(tag: String) -> Self {
        Self(Cow::Owned(tag))
    }
}

impl PartialEq<str> for ErrorType {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ErrorType {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl AsRef<str> for ErrorType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
