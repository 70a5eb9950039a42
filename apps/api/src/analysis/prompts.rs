// Prompt templates for the two analysis stages, and the formatter that fills them.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::analysis::gateway::StagePrompt;
use crate::analysis::industry::Industry;
use crate::analysis::models::{MarketTier, StageKind, StageResult};
use crate::llm_client::prompts::{EVIDENCE_INSTRUCTION, JSON_ONLY_SYSTEM, SCORE_SCALE_INSTRUCTION};

/// Role line for the structure stage system prompt.
const STRUCTURE_ROLE: &str = "You are an expert resume reviewer who evaluates document \
    structure: formatting, section organization, tone and completeness. \
    You judge the resume as a document, independent of any industry.";

/// Structure prompt template. Replace: {scale_instruction}, {evidence_instruction}, {resume_text}
const STRUCTURE_PROMPT_TEMPLATE: &str = r#"{scale_instruction}

{evidence_instruction}

Evaluate the STRUCTURE of the resume below. Return a JSON object with this EXACT schema:
{
  "scores": {
    "format": 82,
    "organization": 74,
    "tone": 68,
    "completeness": 59
  },
  "issues": ["Dates use three different formats"],
  "recommendations": ["Move the skills section above education"],
  "missing_items": ["Contact email"],
  "strengths": ["Consistent bullet style across roles"]
}

DIMENSIONS:
- format: visual consistency, bullet style, date formats, length discipline
- organization: logical section order, reverse chronology, scannability
- tone: active voice, confident and professional register, no filler
- completeness: contact details, summary, experience, education, skills present

RESUME:
{resume_text}"#;

/// Role line for the appeal stage system prompt.
const APPEAL_ROLE: &str = "You are a senior recruiter who judges how competitive a \
    candidate is for roles in a specific industry, and estimates the market tier \
    the resume would be hired at.";

/// Appeal prompt template.
/// Replace: {scale_instruction}, {evidence_instruction}, {industry_label},
///          {industry_focus}, {structure_strengths}, {structure_recommendations},
///          {tier_options}, {resume_text}
const APPEAL_PROMPT_TEMPLATE: &str = r#"{scale_instruction}

{evidence_instruction}

TARGET INDUSTRY: {industry_label}
Hiring managers in this industry weigh: {industry_focus}.

A structural review of this resume already found:
STRENGTHS: {structure_strengths}
RECOMMENDATIONS: {structure_recommendations}
Do not repeat structural feedback; focus on industry competitiveness.

Return a JSON object with this EXACT schema:
{
  "scores": {
    "achievement_relevance": 71,
    "skills_alignment": 80,
    "experience_fit": 66,
    "competitive_positioning": 62
  },
  "market_tier": "mid",
  "issues": ["No quantified revenue impact in the last two roles"],
  "recommendations": ["Lead each role with the largest measurable outcome"],
  "missing_items": ["Industry certification"],
  "strengths": ["Direct experience with the industry's core tooling"]
}

market_tier MUST be exactly one of: {tier_options}.

RESUME:
{resume_text}"#;

/// Stage-specific prompt assembly, as a tagged variant rather than free-form templating.
#[derive(Debug, Clone, Copy)]
pub enum PromptFormatter<'a> {
    Structure,
    Appeal {
        industry: Industry,
        context: &'a StageResult,
    },
}

impl PromptFormatter<'_> {
    pub fn stage(&self) -> StageKind {
        match self {
            PromptFormatter::Structure => StageKind::Structure,
            PromptFormatter::Appeal { .. } => StageKind::Appeal,
        }
    }

    pub fn format(&self, resume_text: &str) -> StagePrompt {
        match self {
            PromptFormatter::Structure => StagePrompt {
                stage: self.stage(),
                system: format!("{STRUCTURE_ROLE} {JSON_ONLY_SYSTEM}"),
                body: fill(
                    STRUCTURE_PROMPT_TEMPLATE,
                    &[
                        ("scale_instruction", SCORE_SCALE_INSTRUCTION),
                        ("evidence_instruction", EVIDENCE_INSTRUCTION),
                        ("resume_text", resume_text),
                    ],
                ),
            },
            PromptFormatter::Appeal { industry, context } => {
                let strengths = bullet_list(&context.strengths);
                let recommendations = bullet_list(&context.recommendations);
                let tiers = tier_options();
                StagePrompt {
                    stage: self.stage(),
                    system: format!("{APPEAL_ROLE} {JSON_ONLY_SYSTEM}"),
                    body: fill(
                        APPEAL_PROMPT_TEMPLATE,
                        &[
                            ("scale_instruction", SCORE_SCALE_INSTRUCTION),
                            ("evidence_instruction", EVIDENCE_INSTRUCTION),
                            ("industry_label", industry.label()),
                            ("industry_focus", industry.hiring_focus()),
                            ("structure_strengths", strengths.as_str()),
                            ("structure_recommendations", recommendations.as_str()),
                            ("tier_options", tiers.as_str()),
                            ("resume_text", resume_text),
                        ],
                    ),
                }
            }
        }
    }
}

/// Replaces `{key}` placeholders of `template` in one pass. Substituted values
/// are never scanned again, so model output or resume text containing a
/// placeholder stays literal. Unknown `{...}` (the JSON schema) is kept as is.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (close, *value))
        });
        match hit {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn tier_options() -> String {
    MarketTier::ALL
        .iter()
        .map(|tier| format!("\"{tier}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none reported)".to_string();
    }
    items
        .iter()
        .take(5)
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
