use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use validator::Validate;

use super::source::{malformed, SettingsSource};
use crate::error::ConfigError;
use crate::services::retry::RetryPolicy;

/// Kind of relational database backing the ODB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdbType {
    Postgresql,
    Sqlite,
}

impl OdbType {
    pub fn as_str(self) -> &'static str {
        match self {
            OdbType::Postgresql => "postgresql",
            OdbType::Sqlite => "sqlite",
        }
    }
}

impl FromStr for OdbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(OdbType::Postgresql),
            "sqlite" => Ok(OdbType::Sqlite),
            other => Err(format!("unsupported ODB type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct PostgresTarget {
    #[validate(length(min = 1, message = "ZATO_ODB_HOST must not be empty"))]
    pub host: String,
    #[validate(range(min = 1, message = "ZATO_ODB_PORT must be between 1 and 65535"))]
    pub port: u16,
    #[validate(length(min = 1, message = "ZATO_ODB_NAME must not be empty"))]
    pub name: String,
}

/// Where the ODB lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OdbTarget {
    Postgresql(PostgresTarget),
    Sqlite { path: PathBuf },
}

#[derive(Clone, Validate)]
pub struct DatabaseConfig {
    pub target: OdbTarget,
    #[validate(length(min = 1, message = "ZATO_ODB_USERNAME must not be empty"))]
    pub username: String,
    pub password: String,
    /// Backoff applied while the database is still coming up.
    pub retry: RetryPolicy,
    /// Upper bound on a single script execution.
    pub statement_timeout: Duration,
    /// Per-attempt connect timeout handed to the pool.
    pub connect_timeout: Duration,
    /// Directory whose `<script>.sql` files replace the bundled scripts.
    pub scripts_dir: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Resolve database settings. Connection credentials default to the
    /// admin principal's when not given separately.
    pub fn from_source(
        source: &SettingsSource,
        admin_username: &str,
        admin_password: &str,
    ) -> Result<Self, ConfigError> {
        let odb_type = match source.get("ZATO_ODB_TYPE") {
            Some(value) => value
                .parse::<OdbType>()
                .map_err(|reason| malformed("ZATO_ODB_TYPE", &value, reason))?,
            None => OdbType::Postgresql,
        };

        let target = match odb_type {
            OdbType::Postgresql => {
                let target = PostgresTarget {
                    host: source.require("ZATO_ODB_HOST")?,
                    port: source.parse::<u16>("ZATO_ODB_PORT")?.unwrap_or(5432),
                    name: source.require("ZATO_ODB_NAME")?,
                };
                target.validate()?;
                OdbTarget::Postgresql(target)
            }
            OdbType::Sqlite => {
                let path = source
                    .path("ZATO_ODB_SQLITE_PATH")
                    .ok_or(ConfigError::Missing("ZATO_ODB_SQLITE_PATH"))?;
                OdbTarget::Sqlite { path }
            }
        };

        let defaults = RetryPolicy::database_default();
        let retry = RetryPolicy::new(
            source
                .millis("ZATO_DB_RETRY_INITIAL_MS")?
                .unwrap_or(defaults.initial_interval),
            source
                .millis("ZATO_DB_RETRY_MAX_INTERVAL_MS")?
                .unwrap_or(defaults.max_interval),
            source
                .seconds("ZATO_DB_MAX_WAIT_SECS")?
                .unwrap_or(defaults.max_wait),
        );

        let config = Self {
            target,
            username: source
                .get("ZATO_ODB_USERNAME")
                .unwrap_or_else(|| admin_username.to_string()),
            password: source
                .get("ZATO_ODB_PASSWORD")
                .unwrap_or_else(|| admin_password.to_string()),
            retry,
            statement_timeout: source
                .seconds("ZATO_DB_STATEMENT_TIMEOUT_SECS")?
                .unwrap_or(Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(5),
            scripts_dir: source.path("ZATO_SQL_DIR"),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn odb_type(&self) -> OdbType {
        match self.target {
            OdbTarget::Postgresql(_) => OdbType::Postgresql,
            OdbTarget::Sqlite { .. } => OdbType::Sqlite,
        }
    }

    /// Connection URL including credentials. Never log this.
    pub fn url(&self) -> String {
        match &self.target {
            OdbTarget::Postgresql(pg) => format!(
                "postgres://{}:{}@{}:{}/{}",
                urlencoding::encode(&self.username),
                urlencoding::encode(&self.password),
                pg.host,
                pg.port,
                pg.name
            ),
            OdbTarget::Sqlite { path } => format!("sqlite://{}?mode=rwc", path.display()),
        }
    }

    /// Credential-free description for log lines.
    pub fn describe(&self) -> String {
        match &self.target {
            OdbTarget::Postgresql(pg) => {
                format!("postgresql://{}@{}:{}/{}", self.username, pg.host, pg.port, pg.name)
            }
            OdbTarget::Sqlite { path } => format!("sqlite://{}", path.display()),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("target", &self.target)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("retry", &self.retry)
            .field("statement_timeout", &self.statement_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("scripts_dir", &self.scripts_dir)
            .finish()
    }
}
