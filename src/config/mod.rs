//! Configuration for the CRM core.
//!
//! Values come from a TOML file (or defaults) and are then overridden by the
//! environment variables the deployment scripts already export
//! (`DB_NAME`, `DB_USER`, `ADMIN_DB_PASSWORD`, ...). The selected
//! [`Environment`] is fixed here, at construction time, and threaded into the
//! [`ConnectionManager`](crate::db::ConnectionManager).

pub mod error;
pub mod paths;

pub use error::{ConfigError, ConfigResult};

use crate::db::{Environment, Privilege};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CrmConfig {
    /// Production or test database selection
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub keystore: KeystoreConfig,
    pub tokens: TokenConfig,
    pub telemetry: TelemetryConfig,
}

/// Database addressing and credential pairs for both privilege tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: String,
    pub host: String,
    pub port: u16,
    /// Production database name
    pub name: String,
    /// Test database name, must differ from `name`
    pub test_name: String,
    /// Where the embedded engines keep their files
    pub data_dir: PathBuf,
    /// Credentials used for ordinary business operations
    pub restricted: Credentials,
    /// Credentials used for user administration and bootstrap
    pub privileged: Credentials,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "sled".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            name: "epicevents".to_string(),
            test_name: "epicevents_test".to_string(),
            data_dir: paths::default_data_dir(),
            restricted: Credentials::new("epic_user", ""),
            privileged: Credentials::new("epic_admin", ""),
        }
    }
}

/// A database user/password pair
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(user: U, password: P) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Secret store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeystoreBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    /// Service name entries are namespaced under
    pub service_name: String,
    pub backend: KeystoreBackend,
    pub dir: PathBuf,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            service_name: "EpicEvents".to_string(),
            backend: KeystoreBackend::File,
            dir: paths::default_keystore_dir(),
        }
    }
}

/// Token lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl_minutes: 30,
            refresh_ttl_days: 7,
        }
    }
}

impl TokenConfig {
    pub fn access_ttl(&self) -> ConfigResult<Duration> {
        Duration::try_minutes(self.access_ttl_minutes)
            .ok_or_else(|| ConfigError::validation("access token lifetime is out of range"))
    }

    pub fn refresh_ttl(&self) -> ConfigResult<Duration> {
        Duration::try_days(self.refresh_ttl_days)
            .ok_or_else(|| ConfigError::validation("refresh token lifetime is out of range"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Destination of the error telemetry sink, if any
    pub dsn: Option<String>,
}

impl CrmConfig {
    /// Load configuration from `path` (or the platform default location if it
    /// exists), apply environment overrides and validate the result.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = paths::default_config_file();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DB_NAME") {
            self.database.name = value;
        }
        if let Some(value) = lookup("TEST_DB_NAME") {
            self.database.test_name = value;
        }
        if let Some(value) = lookup("DB_HOST") {
            self.database.host = value;
        }
        if let Some(value) = lookup("DB_PORT") {
            self.database.port = value
                .parse()
                .map_err(|e| ConfigError::invalid_override("DB_PORT", format!("{}", e)))?;
        }
        if let Some(value) = lookup("DB_USER") {
            self.database.restricted.user = value;
        }
        if let Some(value) = lookup("DB_PASSWORD") {
            self.database.restricted.password = value;
        }
        if let Some(value) = lookup("ADMIN_DB_USER") {
            self.database.privileged.user = value;
        }
        if let Some(value) = lookup("ADMIN_DB_PASSWORD") {
            self.database.privileged.password = value;
        }
        if let Some(value) = lookup("ERROR_TELEMETRY_DSN") {
            self.telemetry.dsn = Some(value);
        }
        if let Some(value) = lookup("CRM_ENVIRONMENT") {
            self.environment = value
                .parse()
                .map_err(|e: String| ConfigError::invalid_override("CRM_ENVIRONMENT", e))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let db = &self.database;
        if db.name.trim().is_empty() || db.test_name.trim().is_empty() {
            return Err(ConfigError::validation("database names must not be empty"));
        }
        if db.name == db.test_name {
            return Err(ConfigError::validation(
                "production and test databases must be distinct",
            ));
        }
        if db.restricted.user.trim().is_empty() || db.privileged.user.trim().is_empty() {
            return Err(ConfigError::validation("database users must not be empty"));
        }
        if db.driver.trim().is_empty() || db.host.trim().is_empty() {
            return Err(ConfigError::validation("database driver and host are required"));
        }
        let access_ttl = self.tokens.access_ttl()?;
        let refresh_ttl = self.tokens.refresh_ttl()?;
        if access_ttl <= Duration::zero() {
            return Err(ConfigError::validation("access token lifetime must be positive"));
        }
        if refresh_ttl <= access_ttl {
            return Err(ConfigError::validation(
                "refresh token lifetime must exceed access token lifetime",
            ));
        }
        // expiry timestamps are computed from the wall clock at mint time
        if Utc::now().checked_add_signed(refresh_ttl).is_none() {
            return Err(ConfigError::validation(
                "refresh token lifetime overflows the clock",
            ));
        }
        if self.keystore.service_name.trim().is_empty() {
            return Err(ConfigError::validation("keystore service name is required"));
        }
        Ok(())
    }

    pub fn database_name(&self, environment: Environment) -> &str {
        match environment {
            Environment::Production => &self.database.name,
            Environment::Test => &self.database.test_name,
        }
    }

    pub fn credentials(&self, privilege: Privilege) -> &Credentials {
        match privilege {
            Privilege::Privileged => &self.database.privileged,
            Privilege::Restricted => &self.database.restricted,
        }
    }

    /// `{driver}://{user}:{password}@{host}:{port}/{db_name}`
    pub fn database_uri(&self, privilege: Privilege, environment: Environment) -> String {
        let credentials = self.credentials(privilege);
        self.format_uri(&credentials.user, &credentials.password, environment)
    }

    /// Same as [`database_uri`](Self::database_uri) with the password masked
    pub fn redacted_uri(&self, privilege: Privilege, environment: Environment) -> String {
        let credentials = self.credentials(privilege);
        self.format_uri(&credentials.user, "***", environment)
    }

    /// On-disk location of the embedded database for `environment`
    pub fn database_path(&self, environment: Environment) -> PathBuf {
        self.database.data_dir.join(self.database_name(environment))
    }

    fn format_uri(&self, user: &str, password: &str, environment: Environment) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}",
            self.database.driver,
            user,
            password,
            self.database.host,
            self.database.port,
            self.database_name(environment)
        )
    }
}
