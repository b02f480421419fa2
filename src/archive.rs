//! Uploaded export archives: buffering, manifest inspection, and validation.
//!
//! A zip container keeps its directory at the end of the file, so uploads
//! are fully buffered (up to a configured limit) before anything is parsed.
//! The validator and the shard extractor then make independent passes over
//! the same in-memory [`Archive`].

use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::{ArchiveError, ParseError, ParseErrorKind};

/// Metadata files every export carries at fixed paths.
pub const REQUIRED_PATHS: [&str; 3] = [
    "data/js/tweet_index.js",
    "data/js/user_details.js",
    "data/js/payload_details.js",
];

/// One file per calendar month, e.g. `data/js/tweets/2013_01.js`.
pub const SHARD_GLOB: &str = "data/js/tweets/????_??.js";

/// Decompressed size allowed for a single entry unless the caller sets one.
pub const DEFAULT_ENTRY_LIMIT: u64 = 256 * 1024 * 1024;

static SHARD_MATCHER: LazyLock<GlobMatcher> = LazyLock::new(|| {
    GlobBuilder::new(SHARD_GLOB)
        .literal_separator(true)
        .build()
        .expect("shard glob is a valid pattern")
        .compile_matcher()
});

/// Whether `path` names a month shard.
pub fn is_shard_path(path: &str) -> bool {
    SHARD_MATCHER.is_match(path)
}

/// Accumulates upload bytes and refuses to grow past `limit`.
#[derive(Debug)]
pub struct UploadBuffer {
    bytes: Vec<u8>,
    limit: u64,
}

impl UploadBuffer {
    pub fn new(limit: u64) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ArchiveError> {
        if self.bytes.len() as u64 + chunk.len() as u64 > self.limit {
            return Err(ArchiveError::TooLarge { limit: self.limit });
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Opens the buffered bytes; entries may decompress to at most `limit` bytes each.
    pub fn into_archive(self) -> Result<Archive, ArchiveError> {
        Ok(Archive::from_bytes(self.bytes)?.with_entry_limit(self.limit))
    }
}

/// Reads all of `reader` into memory, failing once more than `limit` bytes arrive.
pub fn read_bounded<R: Read>(reader: R, limit: u64) -> Result<Vec<u8>, ArchiveError> {
    let mut bytes = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Err(ArchiveError::TooLarge { limit });
    }
    Ok(bytes)
}

/// An entry's path and full decompressed contents.
#[derive(Debug, Clone)]
pub struct RawArchiveEntry {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// The set of entry paths found in an archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveManifest {
    paths: BTreeSet<String>,
}

impl ArchiveManifest {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Shard paths in lexical (and therefore chronological) order.
    pub fn shard_paths(&self) -> Vec<&str> {
        self.paths
            .iter()
            .map(String::as_str)
            .filter(|p| is_shard_path(p))
            .collect()
    }

    /// Required paths that are absent, followed by the shard pattern when no
    /// shard matched. Empty for a well-formed archive.
    pub fn missing(&self) -> Vec<String> {
        let mut missing: Vec<String> = REQUIRED_PATHS
            .iter()
            .filter(|p| !self.contains(p))
            .map(|p| p.to_string())
            .collect();
        if !self.paths.iter().any(|p| is_shard_path(p)) {
            missing.push(SHARD_GLOB.to_string());
        }
        missing
    }

    /// True only when every required file is present and at least one shard
    /// matches. Each problem is logged; absence is not an error.
    pub fn validate(&self) -> bool {
        let mut valid = true;
        for path in REQUIRED_PATHS {
            if !self.contains(path) {
                warn!(path, "expected file missing from archive");
                valid = false;
            }
        }
        if !valid {
            return false;
        }
        if !self.paths.iter().any(|p| is_shard_path(p)) {
            warn!(pattern = SHARD_GLOB, "no tweet shards found in archive");
            return false;
        }
        debug!(entries = self.paths.len(), "archive layout ok");
        true
    }
}

/// A fully buffered, seekable zip archive.
///
/// Entry sizes in the central directory are whatever the uploader wrote, so
/// they are never trusted for allocation. Reads stop at `entry_limit`.
pub struct Archive {
    zip: zip::ZipArchive<Cursor<Vec<u8>>>,
    entry_limit: u64,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.zip.len())
            .field("entry_limit", &self.entry_limit)
            .finish()
    }
}

impl Archive {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ArchiveError> {
        let zip = zip::ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self {
            zip,
            entry_limit: DEFAULT_ENTRY_LIMIT,
        })
    }

    /// Buffers `reader` (bounded by `limit`) and opens it as a zip archive.
    /// The same limit applies to each decompressed entry.
    pub fn from_reader<R: Read>(reader: R, limit: u64) -> Result<Self, ArchiveError> {
        Ok(Self::from_bytes(read_bounded(reader, limit)?)?.with_entry_limit(limit))
    }

    pub fn with_entry_limit(mut self, limit: u64) -> Self {
        self.entry_limit = limit;
        self
    }

    pub fn manifest(&self) -> ArchiveManifest {
        ArchiveManifest::from_paths(self.zip.file_names())
    }

    pub fn validate(&self) -> bool {
        self.manifest().validate()
    }

    /// Opens `path` afresh and reads it to the end, failing once the
    /// decompressed data passes the entry limit.
    pub fn read_entry(&mut self, path: &str) -> Result<RawArchiveEntry, ParseError> {
        let limit = self.entry_limit;
        let entry = self
            .zip
            .by_name(path)
            .map_err(|e| ParseError::new(path, ParseErrorKind::Open(e)))?;

        let mut bytes = Vec::new();
        entry
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| ParseError::new(path, ParseErrorKind::Read(e)))?;
        if bytes.len() as u64 > limit {
            return Err(ParseError::new(path, ParseErrorKind::TooLarge { limit }));
        }

        Ok(RawArchiveEntry {
            path: path.to_string(),
            bytes,
        })
    }
}
