//! Locally computed confidence for a stage result.
//!
//! The model's own self-assessment is never consulted. Confidence reflects
//! only what we can check: are the required fields there and in range, did the
//! model fill the feedback lists, and how cleanly was the JSON delivered.

/// How the JSON object was found in the raw model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseForm {
    /// The whole response is a JSON object.
    Bare,
    /// Wrapped in markdown code fences.
    Fenced,
    /// Surrounded by prose; the outermost braces were cut out.
    Embedded,
}

impl ResponseForm {
    pub fn score(self) -> f64 {
        match self {
            ResponseForm::Bare => 1.0,
            ResponseForm::Fenced => 0.9,
            ResponseForm::Embedded => 0.7,
        }
    }
}

const FIELD_WEIGHT: f64 = 0.5;
const FEEDBACK_WEIGHT: f64 = 0.2;
const FORM_WEIGHT: f64 = 0.3;
/// Applied when every required score is identical, which usually means the
/// model echoed a template instead of scoring.
const FLAT_SCORE_PENALTY: f64 = 0.1;
/// issues, recommendations, strengths. `missing_items` may legitimately be empty.
pub const FEEDBACK_LISTS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceSignals {
    pub required_fields: usize,
    /// Present, numeric and within 0–100 (or a recognised tier).
    pub valid_fields: usize,
    pub feedback_lists_filled: usize,
    pub form: ResponseForm,
    pub flat_scores: bool,
}

/// 0.5·field completeness + 0.2·feedback coverage + 0.3·form, minus the flat
/// penalty, clamped to 0–1 and rounded to four decimals.
pub fn compute_confidence(signals: &ConfidenceSignals) -> f64 {
    let completeness = if signals.required_fields == 0 {
        0.0
    } else {
        signals.valid_fields.min(signals.required_fields) as f64 / signals.required_fields as f64
    };
    let coverage = signals.feedback_lists_filled.min(FEEDBACK_LISTS) as f64 / FEEDBACK_LISTS as f64;

    let mut confidence = FIELD_WEIGHT * completeness
        + FEEDBACK_WEIGHT * coverage
        + FORM_WEIGHT * signals.form.score();

    if signals.flat_scores {
        confidence -= FLAT_SCORE_PENALTY;
    }

    (confidence.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}
