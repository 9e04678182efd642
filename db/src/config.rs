use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;

use crate::DbError;

const DEFAULT_DATABASE_URL: &str = "verses.db";
const DEFAULT_POOL_SIZE: u32 = 8;
const DEFAULT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_IMPORT_BATCH_SIZE: usize = 1000;

/// Runtime settings for the verse store.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// SQLite database path (`DATABASE_URL`).
    pub database_url: String,
    /// Maximum pooled connections (`DB_POOL_SIZE`).
    pub pool_size: u32,
    /// Upper bound for acquiring a connection and for lock waits (`DB_TIMEOUT_MS`).
    pub timeout: Duration,
    /// Verses parsed, classified and inserted per batch (`IMPORT_BATCH_SIZE`).
    pub import_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            import_batch_size: DEFAULT_IMPORT_BATCH_SIZE,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment, after loading
    /// any `.env` file. Unset variables fall back to the defaults.
    pub fn from_env() -> Result<Config, DbError> {
        dotenv().ok();
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// A single-connection in-memory database. The pool must stay at one
    /// connection, since every `:memory:` connection is its own database.
    pub fn in_memory() -> Config {
        Config {
            database_url: ":memory:".to_string(),
            pool_size: 1,
            ..Config::default()
        }
    }

    fn from_lookup<F>(lookup: F) -> Result<Config, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let pool_size = parse_var(&lookup, "DB_POOL_SIZE", defaults.pool_size)?;
        if pool_size == 0 {
            return Err(invalid("DB_POOL_SIZE", "0"));
        }
        let import_batch_size =
            parse_var(&lookup, "IMPORT_BATCH_SIZE", defaults.import_batch_size)?;
        if import_batch_size == 0 {
            return Err(invalid("IMPORT_BATCH_SIZE", "0"));
        }
        let timeout_ms = parse_var(&lookup, "DB_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;

        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            pool_size,
            timeout: Duration::from_millis(timeout_ms),
            import_batch_size,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, DbError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| invalid(key, &value)),
    }
}

fn invalid(key: &str, value: &str) -> DbError {
    DbError::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
    }
}
