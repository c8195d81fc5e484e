//! Acts ingestion server binary
//!
//! Run with: cargo run -p acts-ingest --bin acts-ingest-server -- serve

use acts_ingest::{
    config::IngestConfig,
    ingestion::ToolEngine,
    processing::{CancelSignal, LogSink, RunOrchestrator},
    providers::StoreOp,
    server::ActsServer,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "acts-ingest-server", version, about = "Municipal acts ingestion pipeline")]
struct Cli {
    /// Path to config TOML file (falls back to ACTS_INGEST_CONFIG, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the WebSocket run endpoint (default)
    Serve,
    /// Run the pipeline once, logging progress, then exit
    Run {
        /// Keep records in memory and only log what would be forwarded
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acts_ingest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config =
        IngestConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");
    tracing::info!("  - Store: {}", config.store.base_url);
    tracing::info!("  - Forwarding: {}", config.forwarding.base_url);
    tracing::info!("  - Data dir: {}", config.extraction.data_dir.display());
    tracing::info!("  - Issuers: {:?}", config.sources.enabled);

    let missing = ToolEngine::missing_tools();
    if !missing.is_empty() {
        tracing::warn!("Extraction tools not found: {}", missing.join(", "));
        tracing::warn!("Install poppler-utils, tesseract-ocr (ukr), antiword and unrtf");
    }

    let config = Arc::new(config);
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let server = ActsServer::new(config).context("Failed to initialize server")?;
            println!("\nServer starting...");
            println!("  Health: http://{}/health", server.address());
            println!("  Run:    ws://{}/acts/ws/", server.address());
            println!("\nPress Ctrl+C to stop\n");
            server.start().await?;
        }
        Command::Run { dry_run: false } => {
            let orchestrator =
                RunOrchestrator::from_config(config).context("Failed to initialize pipeline")?;
            let summary = orchestrator
                .run(Arc::new(LogSink), CancelSignal::never())
                .await;
            if !summary.succeeded() {
                anyhow::bail!("Run finished with failures: {:?}", summary);
            }
        }
        Command::Run { dry_run: true } => {
            let (orchestrator, store) =
                RunOrchestrator::dry_run(config).context("Failed to initialize pipeline")?;
            let summary = orchestrator
                .run(Arc::new(LogSink), CancelSignal::never())
                .await;

            let journal = store.journal();
            let created = journal
                .iter()
                .filter(|op| matches!(op, StoreOp::CreateAct { .. }))
                .count();
            tracing::info!(
                "Dry run: {} acts would be created, {} store changes in total",
                created,
                journal.len()
            );
            if !summary.succeeded() {
                anyhow::bail!("Run finished with failures: {:?}", summary);
            }
        }
    }

    Ok(())
}
