//! SQLite connection management.
//!
//! WAL mode lets searches read while an upload is writing. The busy timeout
//! makes a second writer wait for the first transaction to finish instead of
//! failing straight away; once it gets the lock, constraint checks run
//! against the committed data.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DbConfig;
use crate::error::StoreError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens a pool on the configured database file, creating the file and its
/// parent directories if needed.
pub async fn connect(config: &DbConfig) -> Result<SqlitePool, StoreError> {
    let db_path = &config.path;

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// A private in-memory database. Limited to one connection because every
/// `:memory:` connection is a separate database.
pub async fn connect_in_memory() -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}
