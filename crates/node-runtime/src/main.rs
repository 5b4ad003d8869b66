//! # Quantum-Chain Node Runtime
//!
//! Hosts the fast-query subsystem (qc-18) for a node's JSON-RPC layer.
//!
//! ## Startup Sequence
//!
//! 1. Initialize tracing (`RUST_LOG` overrides the default `info` filter)
//! 2. Load configuration from the environment
//! 3. Open the query store and start the persistence worker
//! 4. Wait for Ctrl+C
//! 5. Flush pending epochs and exit
//!
//! A store that cannot be opened is fatal.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::{FastQueryContainer, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::from_env();

    // The container starts a worker thread and may open RocksDB.
    let container = tokio::task::spawn_blocking(move || FastQueryContainer::new(config))
        .await
        .context("fast-query startup task panicked")?
        .context("failed to start fast-query subsystem")?;
    let container = Arc::new(container);

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    let flushed = tokio::task::spawn_blocking(move || container.shutdown())
        .await
        .context("fast-query shutdown task panicked")?;
    info!("Shutdown complete ({} epochs flushed)", flushed);

    Ok(())
}
