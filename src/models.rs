//! Core data types flowing through ingestion and retrieval.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One decoded element of a shard's JSON array, before schema validation.
pub type GenericRecord = serde_json::Map<String, serde_json::Value>;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A single tweet, normalized and ready to be stored.
///
/// Messages are written once and never updated; a second insert with the
/// same `id` is a load error.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub geo: Option<GeoPoint>,
    pub is_reply: bool,
    pub is_retweet: bool,
    pub in_reply_to_status_id: Option<i64>,
    pub retweeted_status_id: Option<i64>,
    pub hashtags: Vec<String>,
    pub user_mentions: Vec<String>,
    /// The record exactly as it appeared in the archive.
    pub raw: serde_json::Value,
}

/// A ranked match returned by the search engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: i64,
    pub text: String,
    /// Full text with matched terms wrapped in `<b>`/`</b>`.
    pub headline: String,
    pub timestamp: DateTime<Utc>,
    /// Relevance score; higher is better.
    pub score: f64,
}

/// External JSON shape of a search hit.
#[derive(Debug, Clone, Serialize)]
pub struct TweetResponse {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&SearchResult> for TweetResponse {
    fn from(result: &SearchResult) -> Self {
        Self {
            id: result.id.to_string(),
            text: result.text.clone(),
            timestamp: result.timestamp,
        }
    }
}
