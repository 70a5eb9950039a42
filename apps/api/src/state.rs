use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::analysis::orchestrator::AnalysisEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Stateless engine; concurrent requests share it without locking.
    pub engine: Arc<AnalysisEngine>,
    /// Cancelled on shutdown. Each request runs under a child token.
    pub shutdown: CancellationToken,
}
