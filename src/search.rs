//! Ranked full-text search over stored tweets.
//!
//! Free text is turned into a plain conjunctive FTS5 query: every word
//! becomes a quoted term and all terms must match. Stemming happens inside
//! SQLite with the same `porter unicode61` tokenizer that built the index.
//! Results are ordered by `bm25` (best first) and carry a highlighted copy
//! of the whole text. The engine returns every match; callers clamp.

use anyhow::Result;
use sqlx::Row;
use tracing::debug;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::SearchResult;
use crate::store::{self as tweet_store, Store};

pub const HIGHLIGHT_OPEN: &str = "<b>";
pub const HIGHLIGHT_CLOSE: &str = "</b>";

const SEARCH_SQL: &str = r#"
    SELECT tweets_tsv.rowid AS id,
           tweets_tsv.text AS text,
           (SELECT created_at FROM tweets WHERE tweets.id = tweets_tsv.rowid) AS created_at,
           highlight(tweets_tsv, 0, ?, ?) AS headline,
           bm25(tweets_tsv) AS score
    FROM tweets_tsv
    WHERE tweets_tsv MATCH ?
    ORDER BY score
"#;

/// Converts free text into an FTS5 expression, or `None` when the text has
/// no searchable words. Operators and punctuation in the input are never
/// interpreted as query syntax.
pub fn plain_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| format!("\"{}\"", word))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

/// Runs `query` against the store. A blank query returns no results and
/// never touches the database.
pub async fn search(store: &Store, query: &str) -> Result<Vec<SearchResult>, StoreError> {
    let Some(expression) = plain_query(query) else {
        return Ok(Vec::new());
    };
    debug!(query, %expression, "searching tweets");

    let rows = sqlx::query(SEARCH_SQL)
        .bind(HIGHLIGHT_OPEN)
        .bind(HIGHLIGHT_CLOSE)
        .bind(&expression)
        .fetch_all(store.pool())
        .await?;

    rows.iter()
        .map(|row| -> Result<SearchResult, StoreError> {
            let id: i64 = row.get("id");
            let score: f64 = row.get("score");
            Ok(SearchResult {
                id,
                text: row.get("text"),
                headline: row.get("headline"),
                timestamp: tweet_store::timestamp(id, row.get("created_at"))?,
                score: -score, // bm25 is lower-is-better
            })
        })
        .collect()
}

/// CLI entry point: prints ranked results with highlighted excerpts.
pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let store = Store::open(&config.db).await?;
    let results = search(&store, query).await?;
    store.close().await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {}",
            i + 1,
            result.score,
            result.timestamp.format("%Y-%m-%d %H:%M")
        );
        println!(
            "    excerpt: \"{}\"",
            result.headline.replace('\n', " ").trim()
        );
        println!("    id: {}", result.id);
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{message, store};

    #[test]
    fn plain_query_quotes_and_joins_words() {
        assert_eq!(plain_query("hello"), Some("\"hello\"".to_string()));
        assert_eq!(
            plain_query("  rust   sqlite "),
            Some("\"rust\" AND \"sqlite\"".to_string())
        );
    }

    #[test]
    fn plain_query_neutralizes_syntax() {
        assert_eq!(
            plain_query("NEAR(a b) OR \"c\" -d*"),
            Some("\"NEAR\" AND \"a\" AND \"b\" AND \"OR\" AND \"c\" AND \"d\"".to_string())
        );
    }

    #[test]
    fn plain_query_blank_is_none() {
        assert_eq!(plain_query(""), None);
        assert_eq!(plain_query("   "), None);
        assert_eq!(plain_query("!!! ..."), None);
    }

    #[tokio::test]
    async fn empty_query_returns_nothing_without_a_schema() {
        // no ensure_schema: a store query here would fail
        let store = Store::open_in_memory().await.unwrap();
        assert!(search(&store, "").await.unwrap().is_empty());
        assert!(search(&store, "   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unique_token_finds_exactly_one() {
        let store = store().await;
        store
            .load_batch(&[
                message(1, "the quick brown fox"),
                message(2, "a lazy dog sleeps"),
                message(3, "nothing to see here"),
            ])
            .await
            .unwrap();

        let results = search(&store, "fox").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        assert_eq!(results[0].text, "the quick brown fox");
        assert_eq!(results[0].headline, "the quick brown <b>fox</b>");
    }

    #[tokio::test]
    async fn stemming_matches_inflections() {
        let store = store().await;
        store
            .load_batch(&[message(1, "I was running late")])
            .await
            .unwrap();
        let results = search(&store, "runs").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].headline, "I was <b>running</b> late");
    }

    #[tokio::test]
    async fn all_terms_must_match() {
        let store = store().await;
        store
            .load_batch(&[message(1, "rust and sqlite"), message(2, "rust alone")])
            .await
            .unwrap();
        let ids: Vec<i64> = search(&store, "rust sqlite")
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn results_are_ranked_by_relevance() {
        let store = store().await;
        store
            .load_batch(&[
                message(1, "coffee then a very long day of meetings and emails and more meetings"),
                message(2, "coffee coffee coffee"),
                message(3, "tea only"),
                message(4, "water please"),
                message(5, "orange juice"),
                message(6, "sparkling lemonade"),
            ])
            .await
            .unwrap();

        let results = search(&store, "coffee").await.unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn no_match_is_empty() {
        let store = store().await;
        store.load_batch(&[message(1, "hello world")]).await.unwrap();
        assert!(search(&store, "goodbye").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_timestamp_is_an_error() {
        let store = store().await;
        store.load_batch(&[message(5, "corrupted row")]).await.unwrap();
        sqlx::query("UPDATE tweets SET created_at = ? WHERE id = 5")
            .bind(i64::MAX)
            .execute(store.pool())
            .await
            .unwrap();

        let err = search(&store, "corrupted").await.unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidTimestamp { id: 5, value: i64::MAX }),
            "unexpected error: {}",
            err
        );
    }

    #[tokio::test]
    async fn timestamp_comes_from_the_row() {
        let store = store().await;
        let m = message(9, "timestamped");
        store.load_batch(&[m.clone()]).await.unwrap();
        let results = search(&store, "timestamped").await.unwrap();
        assert_eq!(results[0].timestamp, m.created_at);
    }
}
