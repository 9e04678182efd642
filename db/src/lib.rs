#[macro_use]
extern crate diesel;

use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;

/// Type of a pooled SQLite connection manager.
pub type SqliteConnectionManager = r2d2::ConnectionManager<SqliteConnection>;

/// Type for a SQLite connection pool.
pub type SqliteConnectionPool = r2d2::Pool<SqliteConnectionManager>;

pub type DbConnection = SqliteConnection;

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Clone, Error, Debug, PartialEq)]
pub enum DbError {
    #[error("'{}' is not a valid Bible reference.", reference)]
    InvalidReference { reference: String },

    #[error("Invalid request: {}.", reason)]
    Validation { reason: String },

    #[error("There was a connection pool error. Root cause: {:?}.", cause)]
    ConnectionPool { cause: String },

    #[error("There was a database error. Root cause: {:?}.", cause)]
    Other { cause: String },

    #[error("There was a database migration error. Root cause: {:?}.", cause)]
    Migration { cause: String },

    #[error("'{}' is not a valid value for {}.", value, key)]
    InvalidConfig { key: String, value: String },

    #[error("Could not read verse data. Root cause: {:?}.", cause)]
    Import { cause: String },
}

impl DbError {
    /// Whether the error came from the store (timeout, connectivity, failed
    /// query) rather than from the caller's input.
    pub fn is_store_error(&self) -> bool {
        matches!(self, DbError::ConnectionPool { .. } | DbError::Other { .. })
    }

    pub(crate) fn validation(reason: impl Into<String>) -> DbError {
        DbError::Validation {
            reason: reason.into(),
        }
    }
}

impl From<diesel::result::Error> for DbError {
    fn from(e: diesel::result::Error) -> Self {
        DbError::Other {
            cause: e.to_string(),
        }
    }
}

impl From<r2d2::PoolError> for DbError {
    fn from(e: r2d2::PoolError) -> Self {
        DbError::ConnectionPool {
            cause: e.to_string(),
        }
    }
}

/// Applied to every connection the pool hands out.
#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            self.busy_timeout.as_millis()
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Builds a SQLite connection pool from the given configuration.
///
/// Both waiting for a pooled connection and waiting on a locked database are
/// bounded by `config.timeout`.
pub fn build_pool(config: &Config) -> Result<SqliteConnectionPool, DbError> {
    r2d2::Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(config.timeout)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout: config.timeout,
        }))
        .build(SqliteConnectionManager::new(config.database_url.as_str()))
        .map_err(|e| DbError::ConnectionPool {
            cause: e.to_string(),
        })
}

/// Establishes a non-pooled SQLite connection.
pub fn establish_connection(db_url: &str) -> Result<SqliteConnection, DbError> {
    SqliteConnection::establish(db_url).map_err(|e| DbError::ConnectionPool {
        cause: format!("Error connecting to {db_url}: {e}"),
    })
}

/// Run any pending Diesel migrations.
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), DbError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| DbError::Migration {
            cause: e.to_string(),
        })
}

/// Run pending migrations on a connection checked out of `pool`.
pub fn migrate(pool: &SqliteConnectionPool) -> Result<(), DbError> {
    let mut conn = pool.get()?;
    run_migrations(&mut conn)
}

pub mod classifier;
mod config;
pub mod guidance;
pub mod import;
pub mod models;
pub mod retrieval;
mod schema;
mod sword_drill;

pub use config::Config;
pub use retrieval::{OrEmpty, SearchOptions, VerseFinder};
pub use sword_drill::{SwordDrill, SwordDrillable, VerseFilter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_once() {
        let pool = build_pool(&Config::in_memory()).unwrap();
        migrate(&pool).unwrap();
        migrate(&pool).unwrap();

        let mut conn = pool.get().unwrap();
        assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use diesel::prelude::*;

    use crate::import::load_verses;
    use crate::schema::verses;
    use crate::{build_pool, migrate, Config, SwordDrill};

    pub const SAMPLE_VERSES: &[(&str, &str)] = &[
        ("창1:1", "태초에 하나님이 천지를 창조하시니라"),
        (
            "요3:16",
            "하나님이 세상을 이처럼 사랑하사 독생자를 주셨으니 이는 그를 믿는 자마다 멸망하지 않고 영생을 얻게 하려 하심이라",
        ),
        (
            "빌4:6",
            "아무 것도 염려하지 말고 다만 모든 일에 기도와 간구로, 너희 구할 것을 감사함으로 하나님께 아뢰라",
        ),
        (
            "시23:4",
            "내가 사망의 음침한 골짜기로 다닐지라도 해를 두려워하지 않을 것은 주께서 나와 함께 하심이라 주의 지팡이와 막대기가 나를 안위하시나이다",
        ),
        (
            "렘29:11",
            "여호와의 말씀이니라 너희를 향한 나의 생각을 내가 아나니 평안이요 재앙이 아니니라 너희에게 미래와 희망을 주는 것이니라",
        ),
        ("잠3:5", "너는 마음을 다하여 여호와를 신뢰하고 네 명철을 의지하지 말라"),
        ("전9:10", "네 손이 일을 얻는 대로 힘을 다하여 할지어다"),
        (
            "사41:10",
            "두려워하지 말라 내가 너와 함께 함이라 놀라지 말라 나는 네 하나님이 됨이라 내가 너를 굳세게 하리라",
        ),
    ];

    /// An empty, migrated in-memory store.
    pub fn memory_drill() -> SwordDrill {
        let pool = build_pool(&Config::in_memory()).unwrap();
        migrate(&pool).unwrap();
        SwordDrill::new(pool)
    }

    /// An in-memory store loaded with the given verses, in order.
    pub fn seeded_drill(data: &[(&str, &str)]) -> SwordDrill {
        let drill = memory_drill();
        let pairs: Vec<(String, String)> = data
            .iter()
            .map(|(r, t)| (r.to_string(), t.to_string()))
            .collect();
        load_verses(&drill, &pairs, 1000).unwrap();
        drill
    }

    pub fn set_usage(drill: &SwordDrill, reference: &str, count: i32) {
        let mut conn = drill.pool().get().unwrap();
        diesel::update(verses::table.filter(verses::reference.eq(reference)))
            .set(verses::usage_count.eq(count))
            .execute(&mut conn)
            .unwrap();
    }

    pub fn usage_of(drill: &SwordDrill, reference: &str) -> i32 {
        let mut conn = drill.pool().get().unwrap();
        verses::table
            .filter(verses::reference.eq(reference))
            .select(verses::usage_count)
            .first(&mut conn)
            .unwrap()
    }
}
