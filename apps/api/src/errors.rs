use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::error::{AnalysisError, AnalysisErrorKind};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Analysis(err) => match err.kind {
                AnalysisErrorKind::ValidationError => StatusCode::BAD_REQUEST,
                AnalysisErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
                AnalysisErrorKind::GatewayError
                | AnalysisErrorKind::ParseError
                | AnalysisErrorKind::RetriesExhausted => StatusCode::BAD_GATEWAY,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message, correlation_id) = match &self {
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone(), None),
            AppError::Analysis(err) => {
                let code = match err.kind {
                    AnalysisErrorKind::ValidationError => "VALIDATION_ERROR",
                    AnalysisErrorKind::Cancelled => "ANALYSIS_CANCELLED",
                    AnalysisErrorKind::GatewayError => "GATEWAY_ERROR",
                    AnalysisErrorKind::ParseError => "PARSE_ERROR",
                    AnalysisErrorKind::RetriesExhausted => "RETRIES_EXHAUSTED",
                };
                if status.is_server_error() {
                    tracing::error!("Analysis error: {err} details={:?}", err.details);
                }
                (code, err.message.clone(), Some(err.correlation_id.clone()))
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(id) = correlation_id {
            error["correlation_id"] = json!(id);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis_error(kind: AnalysisErrorKind) -> AppError {
        AppError::Analysis(AnalysisError::new(kind, "boom", "corr-1"))
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            analysis_error(AnalysisErrorKind::ValidationError).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            analysis_error(AnalysisErrorKind::Cancelled).status(),
            StatusCode::REQUEST_TIMEOUT
        );
        for kind in [
            AnalysisErrorKind::GatewayError,
            AnalysisErrorKind::ParseError,
            AnalysisErrorKind::RetriesExhausted,
        ] {
            assert_eq!(analysis_error(kind).status(), StatusCode::BAD_GATEWAY);
        }
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("disk on fire")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_analysis_error_body_carries_correlation_id() {
        let response = analysis_error(AnalysisErrorKind::RetriesExhausted).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "RETRIES_EXHAUSTED");
        assert_eq!(body["error"]["message"], "boom");
        assert_eq!(body["error"]["correlation_id"], "corr-1");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = AppError::Internal(anyhow::anyhow!("secret path /etc/x")).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(body["error"].get("correlation_id").is_none());
        assert!(!body.to_string().contains("secret"));
    }
}
