//! Archive ingestion pipeline.
//!
//! validate → extract each shard → transform each record → one batch load.
//! Every shard is decoded before anything is written, so a bad record
//! anywhere in the archive leaves the store untouched. The load itself is a
//! single transaction, so an upload is stored completely or not at all.
//!
//! Decoding is CPU-bound and runs on tokio's blocking pool; only the load
//! is awaited on the runtime.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, info_span, Span};

use crate::archive::Archive;
use crate::config::Config;
use crate::error::Error;
use crate::models::Message;
use crate::store::Store;
use crate::transform::transform;

/// What an ingestion run stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub shards: usize,
    pub tweets: u64,
}

/// Validates, decodes, and transforms every record in `archive`.
pub fn collect_messages(archive: &mut Archive) -> crate::error::Result<(usize, Vec<Message>)> {
    if !archive.validate() {
        return Err(Error::Structural {
            missing: archive.manifest().missing(),
        });
    }

    let mut shards = 0;
    let mut messages = Vec::new();
    for shard in archive.shards() {
        let shard = shard?;
        let _span = info_span!("shard", path = %shard.path).entered();

        messages.reserve(shard.records.len());
        for (index, record) in shard.records.iter().enumerate() {
            let message = transform(record).map_err(|source| Error::Field {
                path: shard.path.clone(),
                index,
                source,
            })?;
            messages.push(message);
        }
        info!(records = shard.records.len(), "decoded shard");
        shards += 1;
    }

    Ok((shards, messages))
}

/// Runs [`collect_messages`] on a blocking thread, taking ownership of the archive.
pub async fn decode_archive(mut archive: Archive) -> crate::error::Result<(usize, Vec<Message>)> {
    let span = Span::current();
    tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        collect_messages(&mut archive)
    })
    .await?
}

/// Runs the full pipeline against `store`.
pub async fn ingest_archive(store: &Store, archive: Archive) -> crate::error::Result<IngestReport> {
    let (shards, messages) = decode_archive(archive).await?;
    let tweets = store.load_batch(&messages).await?;
    info!(shards, tweets, "archive ingested");
    Ok(IngestReport { shards, tweets })
}

/// CLI entry point: buffers a local archive and ingests it.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open archive: {}", path.display()))?;
    let archive = Archive::from_reader(file, config.upload.max_archive_bytes)
        .with_context(|| format!("Failed to read archive: {}", path.display()))?;

    let store = Store::open(&config.db).await?;
    store.ensure_schema().await?;
    let result = ingest_archive(&store, archive).await;
    store.close().await;
    let report = result?;

    println!("import {}", path.display());
    println!("  shards: {}", report.shards);
    println!("  tweets loaded: {}", report.tweets);
    println!("ok");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::archive::tests::build_zip;
    use crate::archive::REQUIRED_PATHS;
    use crate::error::{FieldError, ParseErrorKind, StoreError};
    use crate::search::search;
    use crate::store::tests::store;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A well-formed export with the given shards.
    pub(crate) fn export_zip(shards: &[(&str, &str)]) -> Vec<u8> {
        let mut entries: Vec<(&str, &str)> =
            REQUIRED_PATHS.iter().map(|p| (*p, "var x = {};")).collect();
        entries.extend_from_slice(shards);
        build_zip(&entries)
    }

    pub(crate) const HELLO_SHARD: &str =
        "var x = \n[{\"id_str\":\"42\",\"created_at\":\"2013-01-01\",\"text\":\"hello world\"}];";

    #[tokio::test]
    async fn end_to_end_hello_world() {
        let store = store().await;
        let archive =
            Archive::from_bytes(export_zip(&[("data/js/tweets/2013_01.js", HELLO_SHARD)])).unwrap();

        let report = ingest_archive(&store, archive).await.unwrap();
        assert_eq!(report, IngestReport { shards: 1, tweets: 1 });

        let results = search(&store, "hello").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.to_string(), "42");
    }

    #[tokio::test]
    async fn loads_every_shard() {
        let store = store().await;
        let archive = Archive::from_bytes(export_zip(&[
            (
                "data/js/tweets/2013_01.js",
                "v =\n[{\"id_str\":\"1\",\"created_at\":\"2013-01-01\",\"text\":\"a\"},{\"id_str\":\"2\",\"created_at\":\"2013-01-02\",\"text\":\"b\"}]",
            ),
            (
                "data/js/tweets/2013_02.js",
                "v =\n[{\"id_str\":\"3\",\"created_at\":\"2013-02-01\",\"text\":\"c\"}]",
            ),
        ]))
        .unwrap();

        let report = ingest_archive(&store, archive).await.unwrap();
        assert_eq!(report, IngestReport { shards: 2, tweets: 3 });
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn invalid_layout_is_structural() {
        let store = store().await;
        let archive = Archive::from_bytes(build_zip(&[(
            "data/js/tweets/2013_01.js",
            HELLO_SHARD,
        )]))
        .unwrap();

        match ingest_archive(&store, archive).await.unwrap_err() {
            Error::Structural { missing } => assert_eq!(missing.len(), 3),
            other => panic!("expected structural error, got {}", other),
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_shard_aborts_upload() {
        let store = store().await;
        let archive = Archive::from_bytes(export_zip(&[
            ("data/js/tweets/2013_01.js", HELLO_SHARD),
            ("data/js/tweets/2013_02.js", "v =\n[{\"id_str\":"),
        ]))
        .unwrap();

        match ingest_archive(&store, archive).await.unwrap_err() {
            Error::Parse(e) => {
                assert_eq!(e.path, "data/js/tweets/2013_02.js");
                assert!(matches!(e.kind, ParseErrorKind::Json(_)));
            }
            other => panic!("expected parse error, got {}", other),
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn field_error_names_shard_row_and_field() {
        let store = store().await;
        let archive = Archive::from_bytes(export_zip(&[(
            "data/js/tweets/2013_01.js",
            "v =\n[{\"id_str\":\"1\",\"created_at\":\"2013-01-01\",\"text\":\"ok\"},{\"id_str\":\"2\",\"text\":\"no date\"}]",
        )]))
        .unwrap();

        match ingest_archive(&store, archive).await.unwrap_err() {
            Error::Field {
                path,
                index,
                source,
            } => {
                assert_eq!(path, "data/js/tweets/2013_01.js");
                assert_eq!(index, 1);
                assert_eq!(source, FieldError::Missing("created_at"));
            }
            other => panic!("expected field error, got {}", other),
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn single_line_shard_is_a_parse_error() {
        let store = store().await;
        let one_line =
            "var x = [{\"id_str\":\"42\",\"created_at\":\"2013-01-01\",\"text\":\"hello world\"}];";
        let archive =
            Archive::from_bytes(export_zip(&[("data/js/tweets/2013_01.js", one_line)])).unwrap();

        match ingest_archive(&store, archive).await.unwrap_err() {
            Error::Parse(e) => {
                assert_eq!(e.path, "data/js/tweets/2013_01.js");
                assert!(matches!(e.kind, ParseErrorKind::MissingPrefixLine));
            }
            other => panic!("expected parse error, got {}", other),
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn decoding_leaves_the_runtime_free() {
        let records: Vec<String> = (1..=20_000)
            .map(|i| {
                format!(
                    "{{\"id_str\":\"{}\",\"created_at\":\"2013-01-01 10:00:00 +0000\",\"text\":\"tweet number {}\"}}",
                    i, i
                )
            })
            .collect();
        let shard = format!("v =\n[{}]", records.join(","));
        let archive =
            Archive::from_bytes(export_zip(&[("data/js/tweets/2013_01.js", &shard)])).unwrap();

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            })
        };
        tokio::task::yield_now().await;
        let before = ticks.load(Ordering::SeqCst);

        let (shards, messages) = decode_archive(archive).await.unwrap();
        let after = ticks.load(Ordering::SeqCst);
        ticker.abort();

        assert_eq!(shards, 1);
        assert_eq!(messages.len(), 20_000);
        assert!(after > before, "other tasks never ran while decoding");
    }

    #[tokio::test]
    async fn reimporting_the_same_archive_fails_on_duplicates() {
        let store = store().await;
        let bytes = export_zip(&[("data/js/tweets/2013_01.js", HELLO_SHARD)]);

        ingest_archive(&store, Archive::from_bytes(bytes.clone()).unwrap())
            .await
            .unwrap();
        let err = ingest_archive(&store, Archive::from_bytes(bytes).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Store(StoreError::DuplicateId { id: 42, .. })
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
