//! Schema provisioning for the `tweets` table and its indexes.
//!
//! The searchable text vector lives in an external-content FTS5 table
//! (`tweets_tsv`) and the spatial index in an R*Tree (`tweets_geog`). Both
//! are maintained exclusively by triggers on `tweets`, so tokenization and
//! stemming happen in one place: the database.

use sqlx::SqlitePool;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::error::StoreError;

pub const TABLE: &str = "tweets";

const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE tweets (
        id INTEGER PRIMARY KEY,
        created_at INTEGER NOT NULL,
        latitude REAL,
        longitude REAL,
        text TEXT NOT NULL,
        is_reply INTEGER NOT NULL DEFAULT 0,
        is_rt INTEGER NOT NULL DEFAULT 0,
        in_reply_to_status_id INTEGER,
        retweeted_status_id INTEGER,
        hashtags TEXT NOT NULL DEFAULT '[]',
        user_mentions TEXT NOT NULL DEFAULT '[]',
        full_tweet TEXT NOT NULL
    )
    "#,
    r#"
    CREATE VIRTUAL TABLE tweets_tsv USING fts5(
        text,
        content = 'tweets',
        content_rowid = 'id',
        tokenize = 'porter unicode61'
    )
    "#,
    r#"
    CREATE TRIGGER tweets_tsv_insert AFTER INSERT ON tweets BEGIN
        INSERT INTO tweets_tsv (rowid, text) VALUES (new.id, new.text);
    END
    "#,
    r#"
    CREATE TRIGGER tweets_tsv_delete AFTER DELETE ON tweets BEGIN
        INSERT INTO tweets_tsv (tweets_tsv, rowid, text) VALUES ('delete', old.id, old.text);
    END
    "#,
    r#"
    CREATE TRIGGER tweets_tsv_update AFTER UPDATE OF text ON tweets BEGIN
        INSERT INTO tweets_tsv (tweets_tsv, rowid, text) VALUES ('delete', old.id, old.text);
        INSERT INTO tweets_tsv (rowid, text) VALUES (new.id, new.text);
    END
    "#,
    r#"
    CREATE VIRTUAL TABLE tweets_geog USING rtree(
        id,
        min_lat, max_lat,
        min_lon, max_lon
    )
    "#,
    r#"
    CREATE TRIGGER tweets_geog_insert AFTER INSERT ON tweets
    WHEN new.latitude IS NOT NULL AND new.longitude IS NOT NULL BEGIN
        INSERT INTO tweets_geog VALUES (new.id, new.latitude, new.latitude, new.longitude, new.longitude);
    END
    "#,
    r#"
    CREATE TRIGGER tweets_geog_delete AFTER DELETE ON tweets BEGIN
        DELETE FROM tweets_geog WHERE id = old.id;
    END
    "#,
    r#"
    CREATE TRIGGER tweets_geog_update AFTER UPDATE OF latitude, longitude ON tweets BEGIN
        DELETE FROM tweets_geog WHERE id = old.id;
        INSERT INTO tweets_geog
            SELECT new.id, new.latitude, new.latitude, new.longitude, new.longitude
            WHERE new.latitude IS NOT NULL AND new.longitude IS NOT NULL;
    END
    "#,
    "CREATE INDEX idx_tweets_created_at ON tweets (created_at)",
];

pub async fn table_exists(pool: &SqlitePool) -> Result<bool, StoreError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(TABLE)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Creates the schema if `tweets` does not exist yet. Returns whether
/// anything was created; an existing table is left untouched.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<bool, StoreError> {
    if table_exists(pool).await? {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;
    for statement in CREATE_STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!(table = TABLE, "created tweets table");
    Ok(true)
}

/// CLI entry point for `init`. Safe to run repeatedly.
pub async fn run_init(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db).await?;
    let created = ensure_schema(&pool).await;
    pool.close().await;

    if created? {
        println!("Database initialized at {}", config.db.path.display());
    } else {
        println!("Schema already present at {}", config.db.path.display());
    }
    Ok(())
}
