//! Environment-based configuration.
//!
//! Configuration is read from environment variables through [`Environ`], a read-only snapshot with typed getters whose
//! failures are classified with [`bedrock_error::ErrorType`]s, so that callers can tell a missing value from a malformed
//! one. Environment files (`.env.<ENV>`) can be layered underneath the process environment, with `${KEY}` placeholder
//! substitution.
#![deny(warnings)]
#![deny(missing_docs)]

mod dotenv;
pub use self::dotenv::DotenvError;

mod environ;
pub use self::environ::{Environ, DEFAULT_ENV_NAME, ENV_NAME_KEY};
