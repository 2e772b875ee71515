//! codectx entry point
//!
//! Loads configuration from the environment, wires the providers and the
//! context façade, starts the background reconciler and serves the MCP
//! protocol on stdio through the rmcp SDK. Exits nonzero on startup failure
//! only; operational failures are reported in tool responses.

use std::sync::Arc;

use clap::Parser;
use codectx_application::{CodeContext, Reconciler, SplitterSet};
use codectx_infrastructure::{config::Config, logging};
use codectx_providers::splitter::{CodeSplitter, WindowSplitter};
use codectx_providers::{create_embedding_provider, create_vector_store};
use codectx_server::McpServer;
use tokio_util::sync::CancellationToken;

/// Semantic code indexing MCP server
#[derive(Parser, Debug)]
#[command(name = "codectx", version, about)]
struct Cli {
    /// Override the data directory (registry, snapshots, locks)
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    if let Some(data_dir) = &cli.data_dir {
        // config reads it from the environment like every other knob
        std::env::set_var("CODECTX_DATA_DIR", data_dir);
    }

    let config = Config::from_env()?;
    config.validate()?;
    config.log_summary();

    let embedding = create_embedding_provider(&config.embedding)?;
    let store = create_vector_store(&config.store)?;
    let context = CodeContext::new(
        config,
        embedding,
        store,
        SplitterSet::new(
            Arc::new(CodeSplitter::new()),
            Arc::new(WindowSplitter::new()),
        ),
    )
    .await?;

    let shutdown = CancellationToken::new();

    // Termination signals: cancel in-flight runs and release held locks
    {
        let context = Arc::clone(&context);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_termination().await;
            tracing::info!("Termination signal received");
            context.shutdown().await;
            shutdown.cancel();
        });
    }

    let reconciler_handle = Reconciler::new(Arc::clone(&context)).spawn(shutdown.clone());

    let server = McpServer::new(Arc::clone(&context));
    tokio::select! {
        served = server.serve_stdio() => {
            if let Err(e) = served {
                tracing::error!("MCP transport failed: {}", e);
            }
        }
        _ = shutdown.cancelled() => {
            tracing::info!("Shutdown requested; leaving the protocol loop");
        }
    }

    shutdown.cancel();
    let _ = reconciler_handle.await;
    context.shutdown().await;

    tracing::info!("codectx shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!("Cannot install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}
