//! Error taxonomy for the ingestion pipeline and search engine.
//!
//! Each stage has its own error type so callers can tell which part of an
//! upload failed. Everything converges on [`Error`], which the HTTP layer
//! and CLI turn into a single failure message. Nothing here is retried.

use thiserror::Error;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level failure of an upload or search.
#[derive(Debug, Error)]
pub enum Error {
    /// The archive is readable but does not have the expected layout.
    #[error("invalid tweet archive zipfile (missing: {})", missing.join(", "))]
    Structural { missing: Vec<String> },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A record inside a shard could not be decoded.
    #[error("{path} record {index}: {source}")]
    Field {
        path: String,
        index: usize,
        #[source]
        source: FieldError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The blocking decode task panicked or was cancelled.
    #[error("archive decoding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Structural { .. } => "invalid_archive",
            Error::Archive(ArchiveError::TooLarge { .. }) => "too_large",
            Error::Archive(_) => "invalid_archive",
            Error::Parse(ParseError {
                kind: ParseErrorKind::TooLarge { .. },
                ..
            }) => "too_large",
            Error::Parse(_) => "parse_error",
            Error::Field { .. } => "field_error",
            Error::Store(_) => "store_error",
            Error::Task(_) => "internal",
        }
    }
}

/// The uploaded bytes could not be turned into a readable container.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// A shard entry could not be read or parsed.
#[derive(Debug, Error)]
#[error("{path}: {kind}")]
pub struct ParseError {
    pub path: String,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(path: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("cannot open entry: {0}")]
    Open(#[from] zip::result::ZipError),

    #[error("cannot read entry: {0}")]
    Read(#[from] std::io::Error),

    #[error("no newline after the assignment prefix")]
    MissingPrefixLine,

    #[error("entry decompresses to more than {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A generic record does not fit the message schema.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("missing required field `{0}`")]
    Missing(&'static str),

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` is not a 64-bit integer: {value:?}")]
    InvalidId { field: &'static str, value: String },

    #[error("field `{field}` is not a recognised timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
}

impl FieldError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            FieldError::Missing(field) => *field,
            FieldError::WrongType { field, .. }
            | FieldError::InvalidId { field, .. }
            | FieldError::InvalidTimestamp { field, .. } => *field,
        }
    }
}

/// Connection, schema, or transaction failure in the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row {index}: tweet {id} already exists")]
    DuplicateId { index: usize, id: i64 },

    #[error("row {index}: failed to insert tweet {id}: {source}")]
    Row {
        index: usize,
        id: i64,
        #[source]
        source: sqlx::Error,
    },

    #[error("tweet {id} has an out-of-range timestamp: {value}")]
    InvalidTimestamp { id: i64, value: i64 },

    #[error("failed to encode tweet {id}: {source}")]
    Encode {
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}
