//! # Tarix CLI
//!
//! The `tarix` binary drives the tariff retrieval pipeline end to end.
//!
//! ## Usage
//!
//! ```bash
//! tarix --config ./config/tarix.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tarix init` | Create the SQLite database and the `hts` table |
//! | `tarix load <file>` | Import tariff records from a JSON file |
//! | `tarix embed all` | Embed (or re-embed) every record |
//! | `tarix embed pending` | Embed only missing, stale, or foreign-model rows |
//! | `tarix search "<query>"` | Nearest-neighbor search over embedded records |
//! | `tarix lookup "<hts>"` | Substring lookup on HTS numbers |
//! | `tarix ask "<question>"` | Retrieve context and generate an answer |
//! | `tarix stats` | Show record and embedding counts |
//! | `tarix serve` | Start the HTTP API server |

mod answer;
mod canonical;
mod config;
mod context;
mod db;
mod embedding;
mod error;
mod http;
mod index;
mod ingest;
mod migrate;
mod models;
mod progress;
mod search;
mod server;
mod stats;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::progress::ProgressMode;

/// Tarix — embedding-backed retrieval and Q&A over the Harmonized Tariff
/// Schedule.
#[derive(Parser)]
#[command(
    name = "tarix",
    about = "Embedding-backed retrieval and Q&A over the Harmonized Tariff Schedule",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tarix.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `hts` table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Import tariff records from a JSON file.
    ///
    /// The file is a JSON array of records using the lowercase column
    /// spellings (`htsnumber`, `indent`, `description`, ...). Loaded rows
    /// start without embeddings; run `tarix embed` afterwards.
    Load {
        /// Path to the JSON records file.
        file: PathBuf,

        /// Delete all existing rows before loading.
        #[arg(long)]
        replace: bool,
    },

    /// Manage embedding vectors.
    ///
    /// Requires an embedding provider (huggingface or openai) in config.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Nearest-neighbor search over embedded records.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (defaults to retrieval.top_k).
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Substring lookup on HTS numbers (no embeddings involved).
    Lookup {
        /// Partial HTS number, e.g. `8471`.
        query: String,

        /// Maximum number of results (defaults to retrieval.lookup_limit).
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Answer a question from retrieved tariff context.
    ///
    /// Requires both an embedding provider and an answer provider.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Show record and embedding counts.
    Stats,

    /// Start the HTTP API server on the configured bind address.
    Serve,
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed every record, refreshing existing vectors in place.
    All {
        /// Override the batch size from config (texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,

        /// Progress output: human, json, or off (default: TTY-detected).
        #[arg(long)]
        progress: Option<String>,
    },

    /// Embed records with no vector, a stale text hash, or a vector from
    /// a different model.
    Pending {
        /// Maximum number of records to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the batch size from config (texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,

        /// Progress output: human, json, or off (default: TTY-detected).
        #[arg(long)]
        progress: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load { file, replace } => {
            ingest::run_load(&cfg, &file, replace).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::All {
                batch_size,
                dry_run,
                progress,
            } => {
                let mode = ProgressMode::from_flag(progress.as_deref());
                index::run_embed_all(&cfg, batch_size, dry_run, mode).await?;
            }
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
                progress,
            } => {
                let mode = ProgressMode::from_flag(progress.as_deref());
                index::run_embed_pending(&cfg, batch_size, limit, dry_run, mode).await?;
            }
        },
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Lookup { query, limit } => {
            search::run_lookup(&cfg, &query, limit).await?;
        }
        Commands::Ask { question } => {
            answer::run_ask(&cfg, &question).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
