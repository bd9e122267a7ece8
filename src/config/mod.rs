//! Configuration management.
//!
//! Configuration is assembled from, in increasing precedence: built-in
//! defaults, a TOML file, and `ROSTER_*` environment variables (a `.env`
//! file in the working directory is honored).

use crate::observability::{LogFormat, LoggingConfig};
use crate::security::RegistrationKeyCodec;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Overrides the data directory.
pub const ENV_DATA_DIR: &str = "ROSTER_DATA_DIR";
/// Overrides the database file name.
pub const ENV_DATABASE_FILE: &str = "ROSTER_DATABASE_FILE";
/// Sets the registration key secret.
pub const ENV_REGISTRATION_KEY_SECRET: &str = "ROSTER_REGISTRATION_KEY_SECRET";
/// Overrides the log format (`pretty` or `json`).
pub const ENV_LOG_FORMAT: &str = "ROSTER_LOG_FORMAT";
/// Overrides the log filter directives.
pub const ENV_LOG_FILTER: &str = "ROSTER_LOG_FILTER";

/// Default database file name.
pub const DEFAULT_DATABASE_FILE: &str = "roster.db";

/// Search pagination limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size used when the caller does not choose one.
    pub default_limit: usize,
    /// Largest page size the index will return.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// Main configuration.
#[derive(Debug)]
pub struct RosterConfig {
    /// Directory holding the database.
    pub data_dir: PathBuf,
    /// Database file name within `data_dir`.
    pub database_file: String,
    /// Secret the registration key codec derives its key from.
    pub registration_key_secret: SecretString,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Search pagination limits.
    pub search: SearchConfig,
}

impl Default for RosterConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("", "", "roster")
            .map_or_else(|| PathBuf::from(".roster"), |dirs| dirs.data_dir().to_path_buf());
        Self {
            data_dir,
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            registration_key_secret: SecretString::from(String::new()),
            logging: LoggingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

/// On-disk configuration format. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    database_file: Option<String>,
    registration_key_secret: Option<String>,
    logging: Option<LoggingConfig>,
    search: Option<SearchConfig>,
}

impl RosterConfig {
    /// Loads configuration from a TOML file, filling gaps with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read and
    /// [`Error::InvalidInput`] if it is not valid configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", path.display())))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads `roster/config.toml` from the platform config directory if it
    /// exists, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file is invalid or an override is
    /// malformed.
    pub fn load_default() -> Result<Self> {
        let config = match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env()
    }

    /// Builds configuration from defaults and environment overrides only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an override is malformed.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env()
    }

    /// Platform location of the configuration file.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("roster").join("config.toml"))
    }

    fn apply_env(self) -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `ROSTER_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `ROSTER_LOG_FORMAT` is unknown.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(data_dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(data_dir);
        }
        if let Some(database_file) = lookup(ENV_DATABASE_FILE) {
            self.database_file = database_file;
        }
        if let Some(secret) = lookup(ENV_REGISTRATION_KEY_SECRET) {
            self.registration_key_secret = SecretString::from(secret);
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = LogFormat::parse(&format)?;
        }
        if let Some(filter) = lookup(ENV_LOG_FILTER) {
            self.logging.filter = filter;
        }
        Ok(self)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the registration key secret.
    #[must_use]
    pub fn with_registration_key_secret(mut self, secret: impl Into<String>) -> Self {
        self.registration_key_secret = SecretString::from(secret.into());
        self
    }

    /// Full path of the database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Builds the registration key codec from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no secret is configured.
    pub fn registration_key_codec(&self) -> Result<RegistrationKeyCodec> {
        if self.registration_key_secret.expose_secret().is_empty() {
            return Err(Error::InvalidInput(format!(
                "registration key secret is not configured (set {ENV_REGISTRATION_KEY_SECRET})"
            )));
        }
        Ok(RegistrationKeyCodec::new(&self.registration_key_secret))
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(data_dir) = file.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(database_file) = file.database_file {
            config.database_file = database_file;
        }
        if let Some(secret) = file.registration_key_secret {
            config.registration_key_secret = SecretString::from(secret);
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(search) = file.search {
            config.search = search;
        }
        config
    }
}
