//! HTTP server for the document Q&A system

pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::ProviderRegistry;
use state::AppState;

/// Document Q&A HTTP server
pub struct RagServer {
    state: AppState,
}

impl RagServer {
    /// Create a new server from config and a provider registry
    pub fn new(config: RagConfig, registry: ProviderRegistry) -> Result<Self> {
        let state = AppState::new(config, registry)?;
        Ok(Self { state })
    }

    /// Build the router with all routes
    fn build_router(&self) -> Router {
        let config = self.state.config();
        let mut router = Router::new()
            .route("/health", get(health_check))
            .nest("/api", routes::api_routes(config.server.max_upload_size))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let server = self.state.config().server.clone();
        let addr: SocketAddr = format!("{}:{}", server.host, server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        // Warm autoload providers before accepting traffic
        self.state.registry().autoload();

        let router = self.build_router();

        tracing::info!("Starting server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// State handle, used by the CLI to drive the same components in-process
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
