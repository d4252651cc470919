//! HTTP service: upload a lab report, get back the parsed analysis and a
//! link to the generated PDF.
//!
//! | Method | Path              | Response                                |
//! |--------|-------------------|-----------------------------------------|
//! | GET    | `/`               | HTML landing page                       |
//! | GET    | `/health`         | `{"status":"ok"}`                       |
//! | POST   | `/analyze/`       | analysis JSON (multipart `file` field)  |
//! | GET    | `/download`       | most recent PDF                         |
//! | GET    | `/download/{id}`  | a specific PDF                          |

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod store;

pub use error::HttpError;
pub use routes::create_router;
pub use state::{AppState, ServerContext};
pub use store::{ReportStore, StoredReport};

use crate::analyze::ReportAnalyzer;
use crate::config::ServerConfig;
use crate::error::AnalyzerError;
use std::sync::Arc;
use tracing::info;

/// Bind and serve until Ctrl-C.
pub async fn serve(config: ServerConfig, analyzer: ReportAnalyzer) -> Result<(), AnalyzerError> {
    let addr = config.socket_addr()?;
    let state: AppState = Arc::new(ServerContext::new(analyzer, config).await?);
    info!(
        "Reports are stored in {} (keeping {})",
        state.store.dir().display(),
        state.config.max_stored_reports
    );

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        // Without a signal handler, run until the process is killed.
        Err(_) => std::future::pending::<()>().await,
    }
}
