//! # Tweet Archive CLI (`tweetarchive`)
//!
//! ## Usage
//!
//! ```bash
//! tweetarchive --config ./config/tweetarchive.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tweetarchive init` | Create the SQLite database and schema |
//! | `tweetarchive import <zip>` | Validate and ingest an export archive |
//! | `tweetarchive search "<query>"` | Ranked search with highlighted excerpts |
//! | `tweetarchive stats` | Tweet count, date range, database size |
//! | `tweetarchive serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tweetarchive::{config, ingest, logging, migrate, search, server, stats};

/// Tweet Archive: upload, validate, ingest, and search tweet-export archives.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tweetarchive.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tweetarchive",
    about = "Tweet Archive — ingest and search personal tweet-export archives",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tweetarchive.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, the `tweets` table, and its text and
    /// spatial indexes. Running it again leaves an existing schema untouched.
    Init,

    /// Ingest a tweet-export zip archive.
    ///
    /// The archive must contain `data/js/tweet_index.js`,
    /// `data/js/user_details.js`, `data/js/payload_details.js`, and at least
    /// one `data/js/tweets/YYYY_MM.js` shard. Either every tweet is stored or
    /// none is.
    Import {
        /// Path to the archive.
        path: PathBuf,
    },

    /// Search stored tweets.
    ///
    /// Every word must match (after stemming). Results are ordered by
    /// relevance, best first.
    Search {
        /// Free-text query.
        query: String,
    },

    /// Show tweet count, date range, and database size.
    Stats,

    /// Start the HTTP server.
    Serve {
        /// Address to bind, overriding `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.log)?;

    match cli.command {
        Commands::Init => {
            migrate::run_init(&cfg).await?;
        }
        Commands::Import { path } => {
            ingest::run_import(&cfg, &path).await?;
        }
        Commands::Search { query } => {
            search::run_search(&cfg, &query).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve { bind } => {
            server::run_server(&cfg, bind).await?;
        }
    }

    Ok(())
}
