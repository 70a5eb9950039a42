//! Axum route handlers for the Analysis API.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::analysis::industry::Industry;
use crate::analysis::models::AnalysisResult;
use crate::analysis::orchestrator::AnalysisRequest;
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub resume_text: String,
    pub industry: String,
    /// Generated when absent.
    pub correlation_id: Option<String>,
    /// Capped by the configured pipeline deadline.
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct IndustryInfo {
    pub id: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct IndustriesResponse {
    pub industries: Vec<IndustryInfo>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyses
///
/// Runs the full two-stage analysis and returns the aggregated report.
/// Server shutdown cancels in-flight analyses, and so does the client going
/// away: the run lives in its own task, tied to this handler by a drop guard.
/// A run that dies without a result is a 500.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    if body.deadline_secs == Some(0) {
        return Err(AppError::Validation(
            "deadline_secs must be greater than 0".to_string(),
        ));
    }

    let correlation_id = body
        .correlation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!("Analysis requested [{}] industry={}", correlation_id, body.industry);

    let mut request = AnalysisRequest::new(body.resume_text, body.industry, correlation_id);
    // A deadline past what Instant can represent is no deadline; the engine's
    // pipeline deadline still applies.
    if let Some(at) = body
        .deadline_secs
        .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)))
    {
        request = request.with_deadline(at);
    }

    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let engine = Arc::clone(&state.engine);
    let result = tokio::spawn(async move { engine.analyze(&request, &cancel).await })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("analysis task failed: {e}")))??;

    Ok(Json(result))
}

/// GET /api/v1/analyses/industries
pub async fn handle_list_industries() -> Json<IndustriesResponse> {
    let industries = Industry::ALL
        .iter()
        .map(|industry| IndustryInfo {
            id: industry.id(),
            label: industry.label(),
        })
        .collect();

    Json(IndustriesResponse { industries })
}
