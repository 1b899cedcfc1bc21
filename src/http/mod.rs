//! HTTP API over a shared [`DocumentIndex`].
//!
//! Routes:
//! ```text
//! GET    /health
//! POST   /upload              multipart field "file"
//! POST   /upload/batch        multipart fields "files"
//! POST   /search
//! POST   /mcp/file_search
//! POST   /retrieve_answer
//! GET    /documents/{id}
//! DELETE /documents/{id}
//! ```

mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::log_event;
use crate::store::DocumentIndex;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<RwLock<DocumentIndex>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(index: DocumentIndex, settings: Settings) -> Self {
        Self {
            index: Arc::new(RwLock::new(index)),
            settings: Arc::new(settings),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.settings.server.max_upload_bytes;
    let cors = state.settings.server.cors;

    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::upload))
        .route("/upload/batch", post(handlers::upload_batch))
        .route("/search", post(handlers::search))
        .route("/mcp/file_search", post(handlers::mcp_file_search))
        .route("/retrieve_answer", post(handlers::retrieve_answer))
        .route(
            "/documents/{id}",
            get(handlers::get_document).delete(handlers::delete_document),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Open the configured index and serve until Ctrl-C.
///
/// `bind` overrides `server.host:server.port`.
pub async fn serve_http(settings: Settings, bind: Option<String>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| settings.server.bind_address());

    let open_settings = settings.clone();
    let index =
        tokio::task::spawn_blocking(move || DocumentIndex::open_from_settings(&open_settings))
            .await??;
    log_event!(
        "http",
        "loaded",
        "{} documents from {}",
        index.count(),
        index.path().display()
    );

    let app = router(AppState::new(index, settings));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    log_event!("http", "listening", "http://{bind}");
    eprintln!("docseek listening on http://{bind}");
    eprintln!("Health check: http://{bind}/health");
    eprintln!("Press Ctrl+C to stop the server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    eprintln!("HTTP server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log_event!("http", "shutdown", "received Ctrl-C"),
        Err(e) => {
            tracing::error!(target: "http", "[http] failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
