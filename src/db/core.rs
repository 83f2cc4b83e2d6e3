use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite, Transaction,
};
use std::str::FromStr;
use tokio::time::{sleep, Duration};
use tracing::{info, instrument, warn};

use crate::environment::get_env_var_string;
use crate::repository::{RepositoryError, Store};
use crate::TARGET_DB;

/// Attempts to open a write transaction before giving up on a locked database.
const BEGIN_RETRIES: u32 = 5;

pub trait DbLockErrorExt {
    fn is_database_lock_error(&self) -> bool;
}

impl DbLockErrorExt for sqlx::Error {
    fn is_database_lock_error(&self) -> bool {
        match self {
            // SQLITE_BUSY or SQLITE_LOCKED, including their extended codes
            sqlx::Error::Database(err) => err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map_or(false, |code| matches!(code & 0xff, 5 | 6)),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Get access to the database pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

impl Database {
    #[instrument(target = "db", level = "info")]
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        info!(target: TARGET_DB, "Creating database pool for: {}", database_path);

        let connect_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", database_path))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5))
                .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        info!(target: TARGET_DB, "Database pool created");

        let db = Database { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// A private in-memory database, mostly for tests.
    ///
    /// Every SQLite connection to `:memory:` is its own database, so the pool
    /// holds exactly one connection and never recycles it.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;

        let db = Database { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// Opens the database named by `DATABASE_PATH`, `feedfold.db` by default.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        let database_path = get_env_var_string("DATABASE_PATH", "feedfold.db");
        Database::new(&database_path).await
    }
}

impl Store for Database {
    type Tx = SqliteTx;

    /// Every transaction may write, so it takes the write lock up front.
    /// A deferred transaction that upgrades later fails with SQLITE_BUSY
    /// without waiting when another connection is already writing.
    async fn begin(&self) -> Result<SqliteTx, RepositoryError> {
        let mut backoff = 50; // initial delay in milliseconds
        let mut attempt = 1;
        loop {
            match self.pool.begin_with("BEGIN IMMEDIATE").await {
                Ok(tx) => return Ok(SqliteTx { tx }),
                Err(err) if err.is_database_lock_error() && attempt < BEGIN_RETRIES => {
                    info!(
                        target: TARGET_DB,
                        "Database is locked, waiting {}ms before retrying attempt {}/{}",
                        backoff, attempt, BEGIN_RETRIES
                    );
                    sleep(Duration::from_millis(backoff)).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => {
                    warn!(target: TARGET_DB, "Failed to begin transaction: {}", err);
                    return Err(err.into());
                }
            }
        }
    }
}

/// An open SQLite transaction, rolled back unless committed.
pub struct SqliteTx {
    pub(crate) tx: Transaction<'static, Sqlite>,
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort correctly.
pub(crate) fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_time(column: &'static str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    match DateTime::parse_from_rfc3339(&value) {
        Ok(time) => Ok(time.with_timezone(&Utc)),
        Err(_) => Err(RepositoryError::InvalidValue { column, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lock_errors() {
        assert!(!sqlx::Error::RowNotFound.is_database_lock_error());
        assert!(!sqlx::Error::PoolTimedOut.is_database_lock_error());
    }

    #[test]
    fn test_time_encoding() {
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        let encoded = encode_time(&time);
        assert_eq!(encoded, "2024-03-09T07:05:00.000000Z");
        assert_eq!(decode_time("date", encoded).unwrap(), time);
        assert!(matches!(
            decode_time("date", "yesterday".to_string()),
            Err(RepositoryError::InvalidValue { column: "date", .. })
        ));
    }
}
