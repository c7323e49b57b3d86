//! # docvault CLI
//!
//! The `docvault` binary drives the ingestion and retrieval pipeline from a
//! terminal. Every command acts on behalf of one owner (`--owner`); documents
//! of other owners are invisible to it.
//!
//! ## Usage
//!
//! ```bash
//! docvault --config ./config/docvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docvault init` | Create the SQLite database and run schema migrations |
//! | `docvault add <file> --owner <id>` | Extract, chunk, embed, and store a file |
//! | `docvault list --owner <id>` | List the owner's documents, newest first |
//! | `docvault chunks <id> --owner <id>` | Show a document's chunks |
//! | `docvault delete <id> --owner <id>` | Delete a document and its chunks |
//! | `docvault reprocess <id> --owner <id>` | Regenerate a document's chunks |
//! | `docvault search "<query>" --owner <id>` | Rank the owner's chunks against a query |
//! | `docvault tool "<query>" --owner <id>` | Print the search tool's JSON envelope |
//!
//! Logs go to stderr and honour `RUST_LOG` (default `docvault=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docvault::{config, documents, migrate, search, tool};

/// docvault: a per-owner document knowledge base.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docvault",
    about = "docvault: a per-owner document knowledge base with semantic search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run more than once.
    Init,

    /// Upload a file (pdf, txt, jpg, jpeg, png, webp; at most 10 MiB).
    Add {
        /// File to ingest.
        file: PathBuf,

        /// Owning identity.
        #[arg(long)]
        owner: String,

        /// Document title (defaults to the file name without extension).
        #[arg(long)]
        title: Option<String>,

        /// Override the detected kind: `pdf`, `txt`, `image`, or a MIME type.
        #[arg(long)]
        kind: Option<String>,
    },

    /// List the owner's documents (metadata only), newest first.
    List {
        #[arg(long)]
        owner: String,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show a document's chunks in order.
    Chunks {
        id: String,

        #[arg(long)]
        owner: String,
    },

    /// Delete a document and its chunks. Unknown ids are not an error.
    Delete {
        id: String,

        #[arg(long)]
        owner: String,
    },

    /// Regenerate a document's chunks and embeddings.
    Reprocess {
        id: String,

        #[arg(long)]
        owner: String,
    },

    /// Search the owner's documents.
    Search {
        query: String,

        #[arg(long)]
        owner: String,

        /// Maximum number of results (default from `retrieval.default_limit`).
        #[arg(long)]
        limit: Option<usize>,

        /// Keep only results scoring strictly above this similarity.
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<f32>,

        /// Print JSON instead of formatted text.
        #[arg(long)]
        json: bool,
    },

    /// Run the agent search tool and print its JSON response.
    Tool {
        #[arg(required_unless_present = "schema")]
        query: Option<String>,

        #[arg(long, required_unless_present = "schema")]
        owner: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        /// Print the tool's name, description, and parameter schema instead.
        #[arg(long)]
        schema: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docvault=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            file,
            owner,
            title,
            kind,
        } => {
            documents::run_add(&cfg, &file, &owner, title, kind).await?;
        }
        Commands::List { owner, json } => {
            documents::run_list(&cfg, &owner, json).await?;
        }
        Commands::Chunks { id, owner } => {
            documents::run_chunks(&cfg, &id, &owner).await?;
        }
        Commands::Delete { id, owner } => {
            documents::run_delete(&cfg, &id, &owner).await?;
        }
        Commands::Reprocess { id, owner } => {
            documents::run_reprocess(&cfg, &id, &owner).await?;
        }
        Commands::Search {
            query,
            owner,
            limit,
            threshold,
            json,
        } => {
            search::run_search(&cfg, &query, &owner, limit, threshold, json).await?;
        }
        Commands::Tool {
            query,
            owner,
            limit,
            schema,
        } => {
            let query = query.unwrap_or_default();
            let owner = owner.unwrap_or_default();
            tool::run_tool(&cfg, &query, &owner, limit, schema).await?;
        }
    }

    Ok(())
}
