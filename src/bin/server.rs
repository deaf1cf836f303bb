//! wrag server binary
//!
//! Run with: cargo run --bin wrag-server [config.toml]

use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wrag::{config::RagConfig, server::RagServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wrag=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {} ({} dims)", config.embedding.model, config.embedding.dimensions);
    tracing::info!("  - Generation model: {}", config.generation.default_model);
    tracing::info!(
        "  - Chunking: {:?} x {} (overlap {})",
        config.chunking.split_unit,
        config.chunking.split_length,
        config.chunking.split_overlap
    );
    tracing::info!("  - Vector collection: {}", config.vector_store.collection_name);

    let index_on_startup = config.index_on_startup;
    let server = RagServer::new(config).await?;

    // explicit boot task, run once before serving
    if index_on_startup {
        let report = server.state().indexing().index_all_on_startup().await;
        tracing::info!(
            "Startup indexing: {} indexed, {} unchanged, {} failed",
            report.indexed,
            report.unchanged,
            report.failed
        );
    }

    tracing::info!("API listening on http://{}", server.address());
    server.start().await?;

    Ok(())
}
