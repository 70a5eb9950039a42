//! Appeal Analyst: second pipeline stage. Industry-specific competitiveness and
//! market tier, with the structure stage's findings as context.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::analysis::error::StageError;
use crate::analysis::gateway::{invoke_with_timeout, ModelGateway};
use crate::analysis::industry::Industry;
use crate::analysis::models::{StageKind, StageResult};
use crate::analysis::parsing::parse_stage_output;
use crate::analysis::prompts::PromptFormatter;

pub struct AppealAnalyst<'a> {
    gateway: &'a dyn ModelGateway,
    call_timeout: Duration,
}

impl<'a> AppealAnalyst<'a> {
    pub fn new(gateway: &'a dyn ModelGateway, call_timeout: Duration) -> Self {
        Self {
            gateway,
            call_timeout,
        }
    }

    /// One attempt. An unsupported `industry` fails before the gateway is called.
    pub async fn analyze(
        &self,
        clean_text: &str,
        industry: &str,
        structure_context: &StageResult,
    ) -> Result<StageResult, StageError> {
        let industry: Industry = industry
            .parse()
            .map_err(|e: crate::analysis::industry::UnsupportedIndustry| {
                StageError::Validation(e.to_string())
            })?;

        let prompt = PromptFormatter::Appeal {
            industry,
            context: structure_context,
        }
        .format(clean_text);

        let started = Instant::now();
        let output = invoke_with_timeout(self.gateway, &prompt, self.call_timeout).await?;
        let result = parse_stage_output(StageKind::Appeal, &output, started.elapsed())?;

        debug!(
            "Appeal analysis parsed for {}: confidence={:.2}, tier={:?}",
            industry, result.confidence, result.market_tier
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::MarketTier;
    use crate::analysis::testing::{appeal_json, stage_result, Reply, ScriptedGateway, RESUME_TEXT};

    #[tokio::test]
    async fn test_well_formed_output_produces_result_with_tier() {
        let gateway = ScriptedGateway::healthy();
        let analyst = AppealAnalyst::new(&gateway, Duration::from_secs(5));
        let context = stage_result(StageKind::Structure, 0.9);

        let result = analyst.analyze(RESUME_TEXT, "tech", &context).await.unwrap();

        assert_eq!(result.stage, StageKind::Appeal);
        assert_eq!(result.market_tier, Some(MarketTier::Senior));
        assert_eq!(result.sub_scores["skills_alignment"], 91.0);
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_unsupported_industry_fails_without_gateway_call() {
        let gateway = ScriptedGateway::healthy();
        let analyst = AppealAnalyst::new(&gateway, Duration::from_secs(5));
        let context = stage_result(StageKind::Structure, 0.9);

        let err = analyst
            .analyze(RESUME_TEXT, "underwater-basketry", &context)
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Validation(ref m) if m.contains("underwater-basketry")));
        assert_eq!(gateway.calls(StageKind::Appeal), 0);
    }

    #[tokio::test]
    async fn test_prompt_carries_industry_and_structure_context() {
        let gateway = ScriptedGateway::new()
            .script(StageKind::Appeal, vec![Reply::Text(appeal_json("mid"))]);
        let analyst = AppealAnalyst::new(&gateway, Duration::from_secs(5));
        let context = stage_result(StageKind::Structure, 0.9);

        analyst
            .analyze(RESUME_TEXT, "Healthcare", &context)
            .await
            .unwrap();

        let prompt = &gateway.prompts()[0];
        assert_eq!(prompt.stage, StageKind::Appeal);
        assert!(prompt.body.contains("TARGET INDUSTRY: Healthcare"));
        assert!(prompt.body.contains("structure strength"));
        assert!(prompt.body.contains("structure recommendation"));
    }

    #[tokio::test]
    async fn test_unparseable_tier_still_parses_but_is_incomplete() {
        let gateway = ScriptedGateway::new()
            .script(StageKind::Appeal, vec![Reply::Text(appeal_json("unicorn"))]);
        let analyst = AppealAnalyst::new(&gateway, Duration::from_secs(5));
        let context = stage_result(StageKind::Structure, 0.9);

        let result = analyst.analyze(RESUME_TEXT, "sales", &context).await.unwrap();
        assert_eq!(result.missing_required(), vec!["market_tier"]);
    }
}
