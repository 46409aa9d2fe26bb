//! Document Q&A server binary
//!
//! Run with: cargo run --bin docqa-server

use std::path::Path;

use docqa::config::RagConfig;
use docqa::providers::ProviderRegistry;
use docqa::server::RagServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("DOCQA_CONFIG").unwrap_or_else(|_| "docqa.toml".to_string());
    let providers_path =
        std::env::var("DOCQA_PROVIDERS").unwrap_or_else(|_| "providers.toml".to_string());

    let config = if Path::new(&config_path).exists() {
        RagConfig::load(&config_path)?
    } else {
        tracing::info!("No config file at {}, using defaults", config_path);
        RagConfig::default()
    };

    let registry = if Path::new(&providers_path).exists() {
        ProviderRegistry::load(&providers_path)?
    } else {
        tracing::warn!(
            "No providers file at {}; chat will be unavailable until one is configured",
            providers_path
        );
        ProviderRegistry::empty()
    };

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.embedding.model);
    tracing::info!("  - Chunk size: {}", config.chunking.chunk_size);
    tracing::info!("  - Top-k retrieval: {}", config.retrieval.top_k);
    if let Some(active) = registry.active_id() {
        tracing::info!("  - Active provider: {}", active);
    }

    // Check the embedding service so misconfiguration shows up at startup
    let client = reqwest::Client::new();
    match client
        .get(format!("{}/api/tags", config.embedding.base_url))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Embedding service is running");
        }
        _ => {
            tracing::warn!(
                "Embedding service not available at {}",
                config.embedding.base_url
            );
            tracing::warn!("Start Ollama and pull an embedding model:");
            tracing::warn!("  ollama serve && ollama pull {}", config.embedding.model);
        }
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let server = RagServer::new(config, registry)?;

    println!("\nServer starting...");
    println!("  API: http://{}/api", addr);
    println!("  Health: http://{}/health", addr);
    println!("\nEndpoints:");
    println!("  POST   /api/upload            - Upload documents");
    println!("  POST   /api/chat              - Ask questions");
    println!("  GET    /api/search            - Similarity search");
    println!("  GET    /api/status            - Index overview");
    println!("  DELETE /api/documents         - Clear the index");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
