//! # Ilaria CLI (`ilaria`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ilaria serve` | Prepare the knowledge base and start the HTTP server |
//! | `ilaria ingest` | Build the index from the configured document |
//! | `ilaria ingest --rebuild` | Delete the index and rebuild it |
//! | `ilaria ask "<question>"` | Answer one question from the terminal |
//! | `ilaria stats` | Show index size and dimension |
//!
//! ## Examples
//!
//! ```bash
//! ilaria --config ./config/ilaria.toml serve
//! RUST_LOG=debug ilaria ask "როგორ შევქმნა ახალი პროექტი?"
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use ilaria_rag::{config, server, service};

/// Ilaria RAG: a Georgian-language assistant grounded in the ilaria
/// knowledge base.
#[derive(Parser)]
#[command(
    name = "ilaria",
    about = "Ilaria RAG — a Georgian-language assistant grounded in the ilaria knowledge base",
    version
)]
struct Cli {
    /// Path to a configuration file (TOML).
    ///
    /// Optional. Without it, built-in defaults are used; environment
    /// variables override either.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Ingests the document first if the index is empty.
    Serve,

    /// Chunk, embed, and index the configured document.
    Ingest {
        /// Delete the existing index and rebuild it from the document.
        #[arg(long)]
        rebuild: bool,
    },

    /// Answer a single question.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Show index statistics without loading any model.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    config::load_dotenv(Path::new(".env"))?;
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { rebuild } => {
            service::run_ingest(&cfg, rebuild).await?;
        }
        Commands::Ask { question } => {
            service::run_ask(&cfg, &question).await?;
        }
        Commands::Stats => {
            service::run_stats(&cfg)?;
        }
    }

    Ok(())
}
