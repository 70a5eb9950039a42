//! The language-model capability the pipeline consumes.
//!
//! Analysts never talk to a vendor SDK. They hand a `StagePrompt` to whatever
//! `ModelGateway` the engine was built with: `LlmClient` in production, a
//! scripted fake in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::analysis::error::GatewayError;
use crate::analysis::models::StageKind;

/// A fully formatted request for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePrompt {
    pub stage: StageKind,
    pub system: String,
    pub body: String,
}

/// Raw model text plus the identifier of the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub text: String,
    pub model: String,
}

/// Stateless from the engine's point of view. Pooling and rate limiting are
/// the implementation's business.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn invoke(&self, prompt: &StagePrompt) -> Result<ModelOutput, GatewayError>;
}

/// Invokes the gateway, bounded by `timeout`. Blank output is an error.
pub async fn invoke_with_timeout(
    gateway: &dyn ModelGateway,
    prompt: &StagePrompt,
    timeout: Duration,
) -> Result<ModelOutput, GatewayError> {
    let output = tokio::time::timeout(timeout, gateway.invoke(prompt))
        .await
        .map_err(|_| GatewayError::Timeout(timeout))??;

    if output.text.trim().is_empty() {
        return Err(GatewayError::EmptyContent);
    }
    Ok(output)
}
