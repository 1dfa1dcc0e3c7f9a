//! # Medley CLI
//!
//! Commands for the two demonstration flows:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medley run` | Recreate the collection, ingest images/videos, run the query sequence |
//! | `medley ingest` | Recreate the collection and ingest only |
//! | `medley query` | Run the query sequence against an existing collection |
//! | `medley extract --image <path>` | Extract structured data from an invoice image |
//!
//! All commands accept `--config` pointing to a TOML settings file; secrets
//! (the embedding-service and vision-model API keys) come from the env file
//! referenced by the config.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use medley::config;
use medley::run::{run_extract, run_flow, FlowMode};

/// Medley — a multimodal ingest and similarity-search harness.
#[derive(Parser)]
#[command(
    name = "medley",
    about = "Medley — multimodal ingest, similarity search, and invoice extraction demos",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/medley.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run Flow A end to end: recreate the collection, ingest local images
    /// and videos, then run the aggregation and similarity queries.
    ///
    /// Destructive: any prior collection of the same name is dropped first.
    Run,

    /// Recreate the collection and ingest only (no queries).
    Ingest,

    /// Run the query sequence against an existing collection (no recreate,
    /// no ingest).
    Query,

    /// Send an invoice image to the hosted vision model and print its raw
    /// text response.
    Extract {
        /// Path to the invoice image (jpg/png/webp).
        #[arg(long)]
        image: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Run => run_flow(&cfg, FlowMode::Full).await?,
        Commands::Ingest => run_flow(&cfg, FlowMode::IngestOnly).await?,
        Commands::Query => run_flow(&cfg, FlowMode::QueryOnly).await?,
        Commands::Extract { image } => run_extract(&cfg, &image).await?,
    }

    Ok(())
}
