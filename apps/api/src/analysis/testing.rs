//! Test doubles and fixtures for the analysis pipeline.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::analysis::error::GatewayError;
use crate::analysis::gateway::{ModelGateway, ModelOutput, StagePrompt};
use crate::analysis::models::{MarketTier, StageKind, StageMetadata, StageResult};

pub const TEST_MODEL: &str = "scripted-model";

/// One scripted gateway response.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(GatewayError),
    /// Never answers; only a timeout or cancellation ends the call.
    Hang,
    /// Panics inside the call.
    Panic,
}

/// In-memory gateway that replays a per-stage script and counts invocations.
///
/// Replies are consumed in order; the last reply of a script repeats forever.
#[derive(Default)]
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<StageKind, VecDeque<Reply>>>,
    calls: Mutex<Vec<StageKind>>,
    prompts: Mutex<Vec<StagePrompt>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, stage: StageKind, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(stage, replies.into_iter().collect());
        self
    }

    /// A gateway that answers both stages with well-formed, high-confidence output.
    pub fn healthy() -> Self {
        Self::new()
            .script(StageKind::Structure, vec![Reply::Text(structure_json())])
            .script(StageKind::Appeal, vec![Reply::Text(appeal_json("senior"))])
    }

    pub fn calls(&self, stage: StageKind) -> usize {
        self.calls.lock().unwrap().iter().filter(|s| **s == stage).count()
    }

    /// Stages in the order they were invoked.
    pub fn call_order(&self) -> Vec<StageKind> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<StagePrompt> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_reply(&self, stage: StageKind) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&stage) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Reply::Fail(GatewayError::Upstream(format!("no script for {stage}"))),
        }
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn invoke(&self, prompt: &StagePrompt) -> Result<ModelOutput, GatewayError> {
        self.calls.lock().unwrap().push(prompt.stage);
        self.prompts.lock().unwrap().push(prompt.clone());

        match self.next_reply(prompt.stage) {
            Reply::Text(text) => Ok(ModelOutput {
                text,
                model: TEST_MODEL.to_string(),
            }),
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending().await,
            Reply::Panic => panic!("scripted gateway panic for {}", prompt.stage),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

/// Roughly 120 words of well-formed resume text.
pub const RESUME_TEXT: &str = "Jane Doe\n\
jane.doe@example.com | Berlin, Germany\n\
\n\
Summary\n\
Backend engineer with seven years of experience building distributed payment systems in Rust and Go.\n\
\n\
Experience\n\
Senior Software Engineer, Finlytics GmbH (2020 - present)\n\
- Designed an event-sourced ledger processing 40 million transactions per day with 99.99% availability.\n\
- Cut p99 settlement latency from 900ms to 120ms by replacing a polling pipeline with streaming consumers.\n\
- Mentored four engineers and led the migration of twelve services to Kubernetes.\n\
Software Engineer, ShopWave (2017 - 2020)\n\
- Built the checkout API handling 3,000 requests per second at peak.\n\
\n\
Education\n\
BSc Computer Science, TU Munich (2017)\n\
\n\
Skills\n\
Rust, Go, PostgreSQL, Kafka, Kubernetes, gRPC, observability";

pub fn structure_json() -> String {
    r#"{
        "scores": {"format": 82, "organization": 74, "tone": 68, "completeness": 77},
        "issues": ["Dates use an en dash in one role and a hyphen in another"],
        "recommendations": ["Add a one-line headline under the name"],
        "missing_items": ["LinkedIn or GitHub URL"],
        "strengths": ["Clear reverse-chronological layout", "Bullets lead with outcomes"]
    }"#
    .to_string()
}

pub fn appeal_json(tier: &str) -> String {
    format!(
        r#"{{
            "scores": {{
                "achievement_relevance": 88,
                "skills_alignment": 91,
                "experience_fit": 79,
                "competitive_positioning": 84
            }},
            "market_tier": "{tier}",
            "issues": ["No evidence of on-call or incident ownership"],
            "recommendations": ["Quantify the cost impact of the Kubernetes migration"],
            "missing_items": [],
            "strengths": ["Quantified impact at payment scale", "Modern systems stack"]
        }}"#
    )
}

/// A complete result for `stage` with the given confidence.
pub fn stage_result(stage: StageKind, confidence: f64) -> StageResult {
    let sub_scores = stage
        .required_scores()
        .iter()
        .enumerate()
        .map(|(i, key)| (key.to_string(), 60.0 + 10.0 * i as f64))
        .collect();

    StageResult {
        stage,
        confidence,
        sub_scores,
        issues: vec![format!("{stage} issue")],
        recommendations: vec![format!("{stage} recommendation")],
        missing_items: vec![],
        strengths: vec![format!("{stage} strength")],
        market_tier: stage.requires_market_tier().then_some(MarketTier::Mid),
        metadata: StageMetadata {
            duration_ms: 25,
            model: TEST_MODEL.to_string(),
            attempt: 1,
        },
    }
}
