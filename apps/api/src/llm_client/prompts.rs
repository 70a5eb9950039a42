// Shared prompt fragments.
// Each stage defines its own templates in analysis/prompts.rs; this file
// contains cross-cutting fragments appended to every system prompt.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common scoring rubric so both stages use the same 0–100 scale.
pub const SCORE_SCALE_INSTRUCTION: &str = "\
    Score every dimension as an integer from 0 to 100: \
    90-100 exceptional, 75-89 strong, 60-74 adequate, 40-59 weak, below 40 poor. \
    Use the full range; do NOT give every dimension the same score.";

/// Keeps feedback grounded in the submitted text.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Base every issue, strength and recommendation on the resume text provided. \
    Do NOT invent employers, dates, credentials or metrics. \
    Each list item must be one short, actionable sentence.";
