//! Shared application state.

use crate::analyze::ReportAnalyzer;
use crate::config::ServerConfig;
use crate::server::store::ReportStore;
use std::sync::Arc;

/// Everything a request handler needs.
pub struct ServerContext {
    pub analyzer: ReportAnalyzer,
    pub store: ReportStore,
    pub config: ServerConfig,
}

impl ServerContext {
    /// Open the report store described by `config`.
    pub async fn new(
        analyzer: ReportAnalyzer,
        config: ServerConfig,
    ) -> Result<Self, crate::error::AnalyzerError> {
        let store = ReportStore::open(&config.report_dir, config.max_stored_reports).await?;
        Ok(Self {
            analyzer,
            store,
            config,
        })
    }
}

/// Application state shared across all handlers.
pub type AppState = Arc<ServerContext>;
