//! Configuration - Backend selection from the environment
//!
//! TigerStyle: Read once at start-up, then passed around explicitly.
//!
//! | Variable            | Meaning                                         |
//! |---------------------|-------------------------------------------------|
//! | `HBNB_TYPE_STORAGE` | `db` selects Postgres, anything else the file   |
//! | `HBNB_FILE_PATH`    | storage file (default `file.json`, `~` expanded) |
//! | `HBNB_PG_HOST`      | database host                                   |
//! | `HBNB_PG_PORT`      | database port (optional)                        |
//! | `HBNB_PG_USER`      | database user                                   |
//! | `HBNB_PG_PWD`       | database password                               |
//! | `HBNB_PG_DB`        | database name                                   |
//! | `HBNB_ENV`          | `test` drops the schema on first reload         |

use std::path::PathBuf;

use sqlx::postgres::PgConnectOptions;

use crate::storage::{StorageError, StorageResult, FILE_PATH_DEFAULT};

// =============================================================================
// TigerStyle Constants
// =============================================================================

pub const STORAGE_TYPE_ENV: &str = "HBNB_TYPE_STORAGE";
pub const FILE_PATH_ENV: &str = "HBNB_FILE_PATH";
pub const PG_HOST_ENV: &str = "HBNB_PG_HOST";
pub const PG_PORT_ENV: &str = "HBNB_PG_PORT";
pub const PG_USER_ENV: &str = "HBNB_PG_USER";
pub const PG_PWD_ENV: &str = "HBNB_PG_PWD";
pub const PG_DB_ENV: &str = "HBNB_PG_DB";
pub const ENV_MODE_ENV: &str = "HBNB_ENV";

/// `HBNB_TYPE_STORAGE` value selecting the database backend
pub const STORAGE_TYPE_DB: &str = "db";

/// `HBNB_ENV` value enabling the destructive schema reset
pub const ENV_MODE_TEST: &str = "test";

// =============================================================================
// Types
// =============================================================================

/// Which backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    File,
    Database,
}

/// Database connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Deployment mode (`HBNB_ENV`)
    pub env: Option<String>,
}

impl DatabaseConfig {
    /// Read connection parameters through `lookup`.
    ///
    /// # Errors
    /// Returns error if a required variable is unset or the port is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StorageResult<Self> {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| StorageError::config(format!("{name} is not set")))
        };

        let port = match lookup(PG_PORT_ENV) {
            Some(raw) => Some(raw.parse::<u16>().map_err(|e| {
                StorageError::config(format!("{PG_PORT_ENV}={raw} is not a port: {e}"))
            })?),
            None => None,
        };

        Ok(Self {
            host: required(PG_HOST_ENV)?,
            port,
            user: required(PG_USER_ENV)?,
            password: required(PG_PWD_ENV)?,
            database: required(PG_DB_ENV)?,
            env: lookup(ENV_MODE_ENV),
        })
    }

    /// Only the exact value `test` enables the schema reset.
    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        self.env.as_deref() == Some(ENV_MODE_TEST)
    }

    /// Connection options; nothing is dialed until the pool is built.
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database);
        match self.port {
            Some(port) => options.port(port),
            None => options,
        }
    }
}

/// Storage selection plus everything each backend needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub file_path: PathBuf,
    /// Present when `kind` is `Database`
    pub database: Option<DatabaseConfig>,
}

impl StorageConfig {
    /// File backend at `path`.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: StorageKind::File,
            file_path: path.into(),
            database: None,
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup` (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StorageResult<Self> {
        let file_path = lookup(FILE_PATH_ENV)
            .map(|raw| PathBuf::from(shellexpand::tilde(&raw).to_string()))
            .unwrap_or_else(|| PathBuf::from(FILE_PATH_DEFAULT));

        if lookup(STORAGE_TYPE_ENV).as_deref() == Some(STORAGE_TYPE_DB) {
            let database = DatabaseConfig::from_lookup(&lookup)?;
            return Ok(Self {
                kind: StorageKind::Database,
                file_path,
                database: Some(database),
            });
        }

        Ok(Self {
            kind: StorageKind::File,
            file_path,
            database: None,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
