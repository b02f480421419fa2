//! Record extraction from month shards.
//!
//! Each shard is a JavaScript file whose first line is a variable
//! assignment (`Grailbird.data.tweets_2013_01 =`) and whose remainder is a
//! JSON array of tweet objects. Extraction drops that first line and parses
//! the rest; a trailing `;` after the array is tolerated. A malformed shard
//! is an error, never skipped.

use crate::archive::{Archive, RawArchiveEntry};
use crate::error::{ParseError, ParseErrorKind};
use crate::models::GenericRecord;

/// The records of one shard, in file order.
#[derive(Debug, Clone)]
pub struct Shard {
    pub path: String,
    pub records: Vec<GenericRecord>,
}

/// Parses a shard's bytes: everything after the first newline must be a
/// JSON array of objects.
pub fn parse_shard(path: &str, bytes: &[u8]) -> Result<Vec<GenericRecord>, ParseError> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| ParseError::new(path, ParseErrorKind::MissingPrefixLine))?;

    let body = &bytes[newline + 1..];
    let end = body
        .iter()
        .rposition(|b| !b.is_ascii_whitespace() && *b != b';')
        .map_or(0, |i| i + 1);

    serde_json::from_slice(&body[..end])
        .map_err(|e| ParseError::new(path, ParseErrorKind::Json(e)))
}

impl TryFrom<RawArchiveEntry> for Shard {
    type Error = ParseError;

    fn try_from(entry: RawArchiveEntry) -> Result<Self, Self::Error> {
        let records = parse_shard(&entry.path, &entry.bytes)?;
        Ok(Shard {
            path: entry.path,
            records,
        })
    }
}

/// Lazily opens and parses each shard of an archive in path order.
///
/// Nothing is read until the iterator is advanced. Re-reading a shard means
/// calling [`Archive::read_shard`] again, which reopens the entry.
pub struct Shards<'a> {
    archive: &'a mut Archive,
    paths: std::vec::IntoIter<String>,
}

impl Iterator for Shards<'_> {
    type Item = Result<Shard, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(self.archive.read_shard(&path))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

impl Archive {
    pub fn read_shard(&mut self, path: &str) -> Result<Shard, ParseError> {
        Shard::try_from(self.read_entry(path)?)
    }

    pub fn shards(&mut self) -> Shards<'_> {
        let paths: Vec<String> = self
            .manifest()
            .shard_paths()
            .into_iter()
            .map(str::to_string)
            .collect();
        Shards {
            archive: self,
            paths: paths.into_iter(),
        }
    }
}
