//! Structure Analyst: first pipeline stage. Formatting, organization, tone and
//! completeness, judged the same way for every industry.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::analysis::error::StageError;
use crate::analysis::gateway::{invoke_with_timeout, ModelGateway};
use crate::analysis::models::{StageKind, StageResult};
use crate::analysis::parsing::parse_stage_output;
use crate::analysis::prompts::PromptFormatter;

pub struct StructureAnalyst<'a> {
    gateway: &'a dyn ModelGateway,
    call_timeout: Duration,
}

impl<'a> StructureAnalyst<'a> {
    pub fn new(gateway: &'a dyn ModelGateway, call_timeout: Duration) -> Self {
        Self {
            gateway,
            call_timeout,
        }
    }

    /// One attempt: a single bounded gateway call, then parse and score.
    pub async fn analyze(&self, clean_text: &str) -> Result<StageResult, StageError> {
        let prompt = PromptFormatter::Structure.format(clean_text);

        let started = Instant::now();
        let output = invoke_with_timeout(self.gateway, &prompt, self.call_timeout).await?;
        let result = parse_stage_output(StageKind::Structure, &output, started.elapsed())?;

        debug!(
            "Structure analysis parsed: confidence={:.2}, scores={:?}",
            result.confidence, result.sub_scores
        );
        Ok(result)
    }
}
