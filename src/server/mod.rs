//! HTTP Server
//!
//! Axum router and shared request state for the query surface. All
//! handlers share one read-only pack handle through the engine; a
//! process-wide semaphore bounds concurrent query handlers so a burst of
//! expensive joins degrades to 503s instead of exhausting the process.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod openapi;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Config, ServerConfig};
use crate::engine::QueryEngine;
use crate::pack::Pack;

use self::error::ApiError;
use self::openapi::ApiDoc;

/// Shared state for all request handlers.
pub struct ServerState {
    pub engine: QueryEngine,
    /// Admission gate bounding concurrent query handlers.
    gate: Arc<Semaphore>,
    /// Ceiling on results returned per request.
    pub max_results: usize,
}

impl ServerState {
    pub fn new(pack: Arc<Pack>, config: &Config) -> Self {
        ServerState {
            engine: QueryEngine::new(pack, config.query.execution_config()),
            gate: Arc::new(Semaphore::new(config.server.max_concurrent)),
            max_results: config.server.max_results,
        }
    }

    /// Try to enter the admission gate. Full gate means the caller gets a
    /// 503 instead of queueing indefinitely.
    pub fn admit(&self) -> Result<OwnedSemaphorePermit, ApiError> {
        Arc::clone(&self.gate)
            .try_acquire_owned()
            .map_err(|_| ApiError::overloaded("server overloaded, retry later"))
    }

    /// Permits currently available (observability for tests/stats).
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }
}

/// Build the router for the query surface.
pub fn create_router(state: Arc<ServerState>, config: &ServerConfig) -> Router {
    let cors = if config.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/", get(handlers::health))
        .route("/version", get(handlers::version))
        .route("/predicates", get(handlers::predicates))
        .route("/query/:predicate", get(handlers::predicate_facts))
        .route("/query", post(handlers::query))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(Extension(state))
        .layer(cors)
}

/// Bind and serve until SIGINT/SIGTERM.
pub async fn start_http_server(
    state: Arc<ServerState>,
    config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state, config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("http server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
