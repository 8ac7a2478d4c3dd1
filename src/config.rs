// src/config.rs

use std::{env, fmt, path::PathBuf, time::Duration};

use crate::error::IngestError;

/// Catalog handle of the public Olist e-commerce dataset.
pub const DATASET_HANDLE: &str = "olistbr/brazilian-ecommerce";

/// Upper bound on establishing the database connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Rows per multi-row INSERT statement.
pub const BATCH_SIZE: usize = 100;

pub const REQUIRED_VARS: [&str; 4] = ["DB_HOST", "DB_NAME", "DB_USER", "DB_PASSWORD"];

const DEFAULT_DB_PORT: u16 = 5432;

/// Connection parameters for the target Postgres database.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Where the dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// Remote catalog, cached under `cache_dir`.
    Kaggle {
        cache_dir: PathBuf,
        credentials: Option<(String, String)>,
    },
    /// An already-extracted directory on local disk.
    Local(PathBuf),
}

/// Everything one ingestion run needs. Built once at the HTTP boundary and
/// passed down; nothing below this reads the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db: DbConfig,
    pub dataset: String,
    pub source: DatasetSource,
}

impl Config {
    pub fn from_env() -> Result<Self, IngestError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IngestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(key).is_none())
            .collect();

        let port = match get("DB_PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(p) => p,
                Err(_) => {
                    missing.push("DB_PORT");
                    DEFAULT_DB_PORT
                }
            },
            None => DEFAULT_DB_PORT,
        };

        if !missing.is_empty() {
            return Err(IngestError::ConfigMissing { missing });
        }

        let db = DbConfig {
            host: get("DB_HOST").unwrap_or_default(),
            port,
            name: get("DB_NAME").unwrap_or_default(),
            user: get("DB_USER").unwrap_or_default(),
            password: get("DB_PASSWORD").unwrap_or_default(),
            connect_timeout: CONNECT_TIMEOUT,
        };

        let source = match get("DATASET_DIR") {
            Some(dir) => DatasetSource::Local(PathBuf::from(dir)),
            None => DatasetSource::Kaggle {
                cache_dir: get("KAGGLEHUB_CACHE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| default_cache_dir(get("HOME"))),
                credentials: get("KAGGLE_USERNAME").zip(get("KAGGLE_KEY")),
            },
        };

        Ok(Self {
            db,
            dataset: DATASET_HANDLE.to_string(),
            source,
        })
    }
}

/// `$HOME/.cache/kagglehub`, or a temp-dir fallback when `HOME` is unset.
pub fn default_cache_dir(home: Option<String>) -> PathBuf {
    match home {
        Some(home) => PathBuf::from(home).join(".cache").join("kagglehub"),
        None => env::temp_dir().join("kagglehub"),
    }
}
