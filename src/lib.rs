//! # Tweet Archive
//!
//! Upload, validate, ingest, and search personal tweet-export archives.
//!
//! An export is a zip file holding a few metadata files and one JavaScript
//! shard per month of tweets. Uploads are checked for the expected layout,
//! every shard is decoded and transformed into a typed [`models::Message`],
//! and the whole archive is stored in one transaction. Stored tweets are
//! searchable with stemmed, ranked full-text queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌───────────┐
//! │ Archive  │──▶│ Extract  │──▶│ Transform │──▶│  SQLite   │
//! │ validate │   │ shards   │   │ messages  │   │ FTS5+RTree│
//! └──────────┘   └──────────┘   └───────────┘   └─────┬─────┘
//!                                                     │
//!                               ┌─────────────────────┤
//!                               ▼                     ▼
//!                          ┌──────────┐         ┌──────────┐
//!                          │   CLI    │         │   HTTP   │
//!                          └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tweetarchive init                        # create database
//! tweetarchive import ./tweets.zip         # ingest an export
//! tweetarchive search "coffee"             # ranked results
//! tweetarchive serve                       # upload form + JSON search
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`archive`] | Upload buffering and layout validation |
//! | [`extract`] | Month shard parsing |
//! | [`transform`] | Generic record to typed message |
//! | [`ingest`] | The validate, extract, transform, load pipeline |
//! | [`store`] | Transactional batch load and store queries |
//! | [`search`] | Ranked full-text search |
//! | [`server`] | HTTP front end |
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema provisioning |

pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
pub mod transform;
