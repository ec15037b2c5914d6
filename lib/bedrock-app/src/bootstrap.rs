//! Bootstrap utilities.

use std::path::PathBuf;

use bedrock_config::Environ;
use bedrock_error::{wrap_error, ErrorType, TypedError, TypedResultExt as _};

/// Environment variable holding the application name.
pub const APP_NAME_KEY: &str = "APP_NAME";

/// Environment variable holding the application version.
pub const APP_VERSION_KEY: &str = "APP_VERSION";

/// Environment variable holding the commit the application was built from.
pub const APP_COMMIT_KEY: &str = "APP_COMMIT";

/// Environment variable holding the path of the PID file, if any.
pub const PID_FILE_KEY: &str = "PID_FILE";

/// Identifying details of the running application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppDetails {
    name: String,
    version: String,
    commit: Option<String>,
}

impl AppDetails {
    /// Creates a new `AppDetails` with the given name and version.
    pub fn new<N, V>(name: N, version: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            version: version.into(),
            commit: None,
        }
    }

    /// Sets the commit the application was built from.
    pub fn with_commit<C: Into<String>>(mut self, commit: C) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// Reads the application details from the given environment.
    ///
    /// `APP_NAME` and `APP_VERSION` are required, while `APP_COMMIT` is optional.
    ///
    /// # Errors
    ///
    /// If a required variable is missing, an error of type [`ErrorType::CONFIGURATION`] is returned.
    pub fn from_environ(env: &Environ) -> Result<Self, TypedError> {
        let name = env.get_required(APP_NAME_KEY).with_type(ErrorType::CONFIGURATION)?;
        let version = env.get_required(APP_VERSION_KEY).with_type(ErrorType::CONFIGURATION)?;

        let details = Self::new(name, version);
        Ok(match env.get(APP_COMMIT_KEY).filter(|commit| !commit.is_empty()) {
            Some(commit) => details.with_commit(commit),
            None => details,
        })
    }

    /// Returns the application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the application version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the commit the application was built from, if known.
    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }
}

/// Writes the current process ID to the file named by `PID_FILE`, if set.
///
/// Returns the path that was written, or `None` if `PID_FILE` is unset or empty.
///
/// # Errors
///
/// If the PID cannot be written to the file, an error of type [`ErrorType::CONFIGURATION`] is returned.
pub fn update_pid_file(env: &Environ) -> Result<Option<PathBuf>, TypedError> {
    let Some(pid_file) = env.get(PID_FILE_KEY).filter(|path| !path.is_empty()) else {
        return Ok(None);
    };

    let pid_file = PathBuf::from(pid_file);
    std::fs::write(&pid_file, std::process::id().to_string())
        .map_err(|e| wrap_error!(e, ErrorType::CONFIGURATION, "unable to write PID file {}", pid_file.display()))?;

    Ok(Some(pid_file))
}
