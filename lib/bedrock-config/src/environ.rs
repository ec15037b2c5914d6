use std::{collections::HashMap, fs, path::Path, sync::LazyLock};

use bedrock_error::{typed_error, wrap_error, ErrorType, TypedError};
use regex::{Captures, Regex};
use tracing::debug;

use crate::dotenv;

/// Name of the environment variable selecting which environment file to load.
pub const ENV_NAME_KEY: &str = "ENV";

/// Environment name used when `ENV` is not set.
pub const DEFAULT_ENV_NAME: &str = "local";

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$?\{([^}]*)\}").unwrap());

/// A read-only view of environment variables.
///
/// `Environ` is a snapshot: it is built once, from the process environment, a map of values, and/or an environment file,
/// and never changes afterwards. Values can be read as strings, integers, or booleans, and as optional or required.
///
/// # Environment files
///
/// [`Environ::load`] reads an environment file (`<dir>/.env.<ENV>`, where `ENV` defaults to `local`) on top of the process
/// environment. Values already present in the process environment take precedence over values from the file.
///
/// Once loaded, any value may refer to other values with a `${KEY}` or `{KEY}` placeholder, which is replaced by the value
/// of `KEY` (looked up uppercased first, then lowercased), or by an empty string if neither exists:
///
/// ```text
/// MY_HOME=/users/home/dan
/// SOME_PATH=${MY_HOME}/some/other/path
/// ```
///
/// Placeholders are resolved in a single pass against the values as they were before substitution, so a placeholder whose
/// value itself contains a placeholder is not resolved further.
#[derive(Clone, Debug, Default)]
pub struct Environ {
    values: HashMap<String, String>,
}

impl Environ {
    /// Creates an `Environ` from the current process environment.
    ///
    /// Variables whose key or value is not valid Unicode are skipped.
    pub fn from_process() -> Self {
        let values = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { values }
    }

    /// Creates an `Environ` from the given key/value pairs.
    pub fn from_map<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = values.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { values }
    }

    /// Loads the environment file for the current environment from `dir`, on top of the process environment.
    ///
    /// # Errors
    ///
    /// If the environment file does not exist, cannot be read, or is malformed, an error of type
    /// [`ErrorType::CONFIGURATION`] is returned.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, TypedError> {
        Self::from_process().with_env_file(dir)
    }

    /// Loads the environment file for the current environment from `dir`, on top of the values in this `Environ`.
    ///
    /// The current environment is taken from the `ENV` value in this `Environ`, defaulting to `local`. Values from the
    /// file never override values already present. Placeholders are substituted once the file has been merged in.
    ///
    /// # Errors
    ///
    /// If the environment file does not exist, cannot be read, or is malformed, an error of type
    /// [`ErrorType::CONFIGURATION`] is returned.
    pub fn with_env_file<P: AsRef<Path>>(mut self, dir: P) -> Result<Self, TypedError> {
        let env_name = self.get(ENV_NAME_KEY).unwrap_or(DEFAULT_ENV_NAME).to_string();
        let path = dir.as_ref().join(format!(".env.{}", env_name));

        let contents = fs::read_to_string(&path)
            .map_err(|e| wrap_error!(e, ErrorType::CONFIGURATION, "unable to load .env for {}", env_name))?;
        let entries = dotenv::parse(&contents)
            .map_err(|e| wrap_error!(e, ErrorType::CONFIGURATION, "unable to load .env for {}", env_name))?;

        let entry_count = entries.len();
        for (key, value) in entries {
            self.values.entry(key).or_insert(value);
        }
        self.substitute_placeholders();

        debug!(env = %env_name, path = %path.display(), entry_count, "Loaded environment file.");

        Ok(self)
    }

    fn substitute_placeholders(&mut self) {
        let snapshot = self.values.clone();
        let lookup = |caps: &Captures<'_>| {
            let key = &caps[1];
            snapshot
                .get(&key.to_uppercase())
                .or_else(|| snapshot.get(&key.to_lowercase()))
                .cloned()
                .unwrap_or_default()
        };

        for value in self.values.values_mut() {
            if PLACEHOLDER_REGEX.is_match(value) {
                let substituted = PLACEHOLDER_REGEX.replace_all(value, &lookup).into_owned();
                *value = substituted;
            }
        }
    }

    /// Returns the value of `key`, if it is set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the value of `key`.
    ///
    /// # Errors
    ///
    /// If `key` is not set, an error of type [`ErrorType::VALIDATION`] is returned.
    pub fn get_required(&self, key: &str) -> Result<&str, TypedError> {
        self.get(key).ok_or_else(|| missing_key(key))
    }

    /// Returns the value of `key` as an integer, if it is set.
    ///
    /// # Errors
    ///
    /// If `key` is set, but its value is not a valid integer, an error of type [`ErrorType::INVALID_NUMBER`] is
    /// returned.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>, TypedError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };

        value.parse::<i64>().map(Some).map_err(|e| {
            wrap_error!(
                e,
                ErrorType::INVALID_NUMBER,
                "environment variable {} with value of '{}' is not a valid int",
                key,
                value
            )
        })
    }

    /// Returns the value of `key` as an integer.
    ///
    /// # Errors
    ///
    /// If `key` is not set, an error of type [`ErrorType::VALIDATION`] is returned. If its value is not a valid integer,
    /// an error of type [`ErrorType::INVALID_NUMBER`] is returned.
    pub fn get_required_int(&self, key: &str) -> Result<i64, TypedError> {
        self.get_int(key)?.ok_or_else(|| missing_key(key))
    }

    /// Returns the value of `key` as a boolean, if it is set.
    ///
    /// `true`, `t`, `1`, `yes` and `y` are true, and `false`, `f`, `0`, `no` and `n` are false, ignoring case.
    ///
    /// # Errors
    ///
    /// If `key` is set, but its value is not a valid boolean, an error of type [`ErrorType::INVALID_BOOLEAN`] is
    /// returned.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, TypedError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };

        match value.to_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" => Ok(Some(true)),
            "false" | "f" | "0" | "no" | "n" => Ok(Some(false)),
            _ => Err(typed_error!(
                ErrorType::INVALID_BOOLEAN,
                "environment variable {} with value of '{}' is not a valid boolean",
                key,
                value
            )),
        }
    }

    /// Returns the value of `key` as a boolean.
    ///
    /// # Errors
    ///
    /// If `key` is not set, an error of type [`ErrorType::VALIDATION`] is returned. If its value is not a valid boolean,
    /// an error of type [`ErrorType::INVALID_BOOLEAN`] is returned.
    pub fn get_required_bool(&self, key: &str) -> Result<bool, TypedError> {
        self.get_bool(key)?.ok_or_else(|| missing_key(key))
    }
}

fn missing_key(key: &str) -> TypedError {
    typed_error!(ErrorType::VALIDATION, "missing required env key: {}", key)
}

#[cfg(test)]
mod tests {
    use bedrock_error::get_type;
    use tempfile::TempDir;

    use super::*;

    fn env_dir(file_name: &str, contents: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(file_name), contents).unwrap();
        dir
    }

    #[test]
    fn get_and_get_required() {
        let env = Environ::from_map([("somekey", "somevalue")]);

        assert_eq!(env.get("somekey"), Some("somevalue"));
        assert_eq!(env.get("otherkey"), None);
        assert_eq!(env.get_required("somekey").unwrap(), "somevalue");

        let err = env.get_required("otherkey").unwrap_err();
        assert_eq!(get_type(&err), ErrorType::VALIDATION);
        assert_eq!(err.to_string(), "missing required env key: otherkey");
    }

    #[test]
    fn get_int() {
        let env = Environ::from_map([("port", "8080"), ("negative", "-12"), ("bogus", "eighty")]);

        assert_eq!(env.get_int("port").unwrap(), Some(8080));
        assert_eq!(env.get_int("negative").unwrap(), Some(-12));
        assert_eq!(env.get_int("missing").unwrap(), None);
        assert_eq!(env.get_required_int("port").unwrap(), 8080);

        let err = env.get_int("bogus").unwrap_err();
        assert_eq!(get_type(&err), ErrorType::INVALID_NUMBER);
        assert!(err
            .to_string()
            .starts_with("environment variable bogus with value of 'eighty' is not a valid int: "));

        let err = env.get_required_int("bogus").unwrap_err();
        assert_eq!(get_type(&err), ErrorType::INVALID_NUMBER);

        let err = env.get_required_int("missing").unwrap_err();
        assert_eq!(get_type(&err), ErrorType::VALIDATION);
    }

    #[test]
    fn get_bool() {
        for truthy in ["true", "T", "1", "Yes", "y"] {
            let env = Environ::from_map([("flag", truthy)]);
            assert_eq!(env.get_bool("flag").unwrap(), Some(true), "value: {}", truthy);
        }

        for falsy in ["FALSE", "f", "0", "no", "N"] {
            let env = Environ::from_map([("flag", falsy)]);
            assert_eq!(env.get_bool("flag").unwrap(), Some(false), "value: {}", falsy);
        }

        let env = Environ::from_map([("flag", "maybe")]);
        assert_eq!(env.get_bool("missing").unwrap(), None);

        let err = env.get_bool("flag").unwrap_err();
        assert_eq!(get_type(&err), ErrorType::INVALID_BOOLEAN);
        assert_eq!(
            err.to_string(),
            "environment variable flag with value of 'maybe' is not a valid boolean"
        );

        let err = env.get_required_bool("missing").unwrap_err();
        assert_eq!(get_type(&err), ErrorType::VALIDATION);
    }

    #[test]
    fn env_file_missing_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = Environ::default().with_env_file(dir.path()).unwrap_err();
        assert_eq!(get_type(&err), ErrorType::CONFIGURATION);
        assert!(err.to_string().starts_with("unable to load .env for local: "));
    }

    #[test]
    fn env_file_malformed_is_configuration_error() {
        let dir = env_dir(".env.local", "NOT_A_PAIR\n");

        let err = Environ::default().with_env_file(dir.path()).unwrap_err();
        assert_eq!(get_type(&err), ErrorType::CONFIGURATION);
    }

    #[test]
    fn env_file_values_are_loaded() {
        let dir = env_dir(".env.local", "somekey=somevalue\n");

        let env = Environ::default().with_env_file(dir.path()).unwrap();
        assert_eq!(env.get("somekey"), Some("somevalue"));
    }

    #[test]
    fn env_file_selected_by_env_name() {
        let dir = env_dir(".env.staging", "somekey=staged\n");

        let env = Environ::from_map([(ENV_NAME_KEY, "staging")])
            .with_env_file(dir.path())
            .unwrap();
        assert_eq!(env.get("somekey"), Some("staged"));

        let err = Environ::from_map([(ENV_NAME_KEY, "prod")])
            .with_env_file(dir.path())
            .unwrap_err();
        assert!(err.to_string().starts_with("unable to load .env for prod: "));
    }

    #[test]
    fn existing_values_win_over_env_file() {
        let dir = env_dir(".env.local", "somekey=from_file\notherkey=from_file\n");

        let env = Environ::from_map([("somekey", "from_process")])
            .with_env_file(dir.path())
            .unwrap();
        assert_eq!(env.get("somekey"), Some("from_process"));
        assert_eq!(env.get("otherkey"), Some("from_file"));
    }

    #[test]
    fn placeholders_are_substituted() {
        let dir = env_dir(
            ".env.local",
            "repo_root=/{my_home}/repos\nrepo_cache=/${my_home}/cache\nmy_home=bruno\n",
        );

        let env = Environ::default().with_env_file(dir.path()).unwrap();
        assert_eq!(env.get("repo_root"), Some("/bruno/repos"));
        assert_eq!(env.get("repo_cache"), Some("/bruno/cache"));
    }

    #[test]
    fn placeholders_prefer_uppercase_keys() {
        let dir = env_dir(".env.local", "path=/{home}/bin\nHOME=upper\nhome=lower\n");

        let env = Environ::default().with_env_file(dir.path()).unwrap();
        assert_eq!(env.get("path"), Some("/upper/bin"));
    }

    #[test]
    fn unknown_placeholders_become_empty() {
        let dir = env_dir(".env.local", "path=/{nowhere}/bin\n");

        let env = Environ::default().with_env_file(dir.path()).unwrap();
        assert_eq!(env.get("path"), Some("//bin"));
    }

    #[test]
    fn placeholders_in_existing_values_are_substituted() {
        let dir = env_dir(".env.local", "DATA_ROOT=/srv/data\n");

        let env = Environ::from_map([("CACHE_DIR", "${DATA_ROOT}/cache")])
            .with_env_file(dir.path())
            .unwrap();
        assert_eq!(env.get("CACHE_DIR"), Some("/srv/data/cache"));
    }
}
