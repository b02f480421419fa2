//! The ingestion store: an owned handle over the tweet database.
//!
//! A [`Store`] is built once at process start and handed to whatever needs
//! it (the HTTP state, CLI commands). Cloning is cheap; clones share the
//! underlying pool.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::config::DbConfig;
use crate::db;
use crate::error::StoreError;
use crate::migrate;
use crate::models::Message;

const STATS_SQL: &str = r#"
    SELECT COUNT(*),
           (SELECT id FROM tweets ORDER BY created_at ASC, id ASC LIMIT 1),
           MIN(created_at),
           (SELECT id FROM tweets ORDER BY created_at DESC, id DESC LIMIT 1),
           MAX(created_at)
    FROM tweets
"#;

const INSERT_SQL: &str = r#"
    INSERT INTO tweets (
        id, created_at, latitude, longitude, text, is_reply, is_rt,
        in_reply_to_status_id, retweeted_status_id, hashtags, user_mentions, full_tweet
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

/// Summary figures for the `stats` command.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub tweets: i64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

impl Store {
    pub async fn open(config: &DbConfig) -> Result<Self, StoreError> {
        Ok(Self::from_pool(db::connect(config).await?))
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_pool(db::connect_in_memory().await?))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the schema when missing; a no-op otherwise.
    pub async fn ensure_schema(&self) -> Result<bool, StoreError> {
        migrate::ensure_schema(&self.pool).await
    }

    /// Inserts every message in one transaction.
    ///
    /// The insert statement is prepared on first use and reused from the
    /// connection's statement cache for the remaining rows. Any failing row
    /// aborts the call and the transaction is rolled back, so either the whole
    /// batch is stored or none of it is. Returns the number of rows inserted.
    pub async fn load_batch(&self, messages: &[Message]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        for (index, message) in messages.iter().enumerate() {
            let hashtags = encode(message.id, &message.hashtags)?;
            let user_mentions = encode(message.id, &message.user_mentions)?;
            let full_tweet = encode(message.id, &message.raw)?;

            let result = sqlx::query(INSERT_SQL)
                .bind(message.id)
                .bind(message.created_at.timestamp())
                .bind(message.geo.map(|g| g.latitude))
                .bind(message.geo.map(|g| g.longitude))
                .bind(&message.text)
                .bind(message.is_reply)
                .bind(message.is_retweet)
                .bind(message.in_reply_to_status_id)
                .bind(message.retweeted_status_id)
                .bind(hashtags)
                .bind(user_mentions)
                .bind(full_tweet)
                .execute(&mut *tx)
                .await;

            if let Err(e) = result {
                tx.rollback().await?;
                return Err(row_error(index, message.id, e));
            }
        }

        tx.commit().await?;
        info!(rows = messages.len(), "loaded tweet batch");
        Ok(messages.len() as u64)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tweets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let (tweets, oldest_id, oldest, newest_id, newest): (
            i64,
            Option<i64>,
            Option<i64>,
            Option<i64>,
            Option<i64>,
        ) = sqlx::query_as(STATS_SQL).fetch_one(&self.pool).await?;
        Ok(StoreStats {
            tweets,
            oldest: oldest_id
                .zip(oldest)
                .map(|(id, ts)| timestamp(id, ts))
                .transpose()?,
            newest: newest_id
                .zip(newest)
                .map(|(id, ts)| timestamp(id, ts))
                .transpose()?,
        })
    }

    pub async fn close(&self) {
        debug!("closing store");
        self.pool.close().await;
    }
}

fn encode<T: serde::Serialize + ?Sized>(id: i64, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { id, source })
}

fn row_error(index: usize, id: i64, error: sqlx::Error) -> StoreError {
    let duplicate = error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if duplicate {
        StoreError::DuplicateId { index, id }
    } else {
        StoreError::Row {
            index,
            id,
            source: error,
        }
    }
}

/// Converts a stored `created_at` back into a UTC timestamp.
pub(crate) fn timestamp(id: i64, value: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(value, 0).ok_or(StoreError::InvalidTimestamp { id, value })
}
