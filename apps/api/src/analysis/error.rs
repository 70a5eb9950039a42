use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Failure of a single model invocation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream model error: {0}")]
    Upstream(String),

    #[error("model returned empty content")]
    EmptyContent,
}

impl From<LlmError> for GatewayError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::EmptyContent => GatewayError::EmptyContent,
            other => GatewayError::Upstream(other.to_string()),
        }
    }
}

/// Failure of one analyst attempt, before the validator sees it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageError {
    /// Bad input shape. Never retried.
    #[error("{0}")]
    Validation(String),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The model answered but the output could not be mapped to a stage result.
    #[error("parse error: {0}")]
    Parse(String),
}

impl StageError {
    pub fn kind(&self) -> AnalysisErrorKind {
        match self {
            StageError::Validation(_) => AnalysisErrorKind::ValidationError,
            StageError::Gateway(_) => AnalysisErrorKind::GatewayError,
            StageError::Parse(_) => AnalysisErrorKind::ParseError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisErrorKind {
    ValidationError,
    GatewayError,
    ParseError,
    Cancelled,
    RetriesExhausted,
}

impl AnalysisErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisErrorKind::ValidationError => "validation_error",
            AnalysisErrorKind::GatewayError => "gateway_error",
            AnalysisErrorKind::ParseError => "parse_error",
            AnalysisErrorKind::Cancelled => "cancelled",
            AnalysisErrorKind::RetriesExhausted => "retries_exhausted",
        }
    }
}

impl fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error returned by `AnalysisEngine::analyze`.
///
/// `details` holds only the failing stage's error log, oldest first.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{kind}: {message} (correlation_id={correlation_id})")]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    pub message: String,
    pub correlation_id: String,
    pub details: Vec<String>,
    /// For `RetriesExhausted`: what the last failed attempt ran into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cause: Option<AnalysisErrorKind>,
}

impl AnalysisError {
    pub fn new(
        kind: AnalysisErrorKind,
        message: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            correlation_id: correlation_id.into(),
            details: Vec::new(),
            last_cause: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_last_cause(mut self, cause: AnalysisErrorKind) -> Self {
        self.last_cause = Some(cause);
        self
    }
}
