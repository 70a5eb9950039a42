//! Stage validation: decides whether a stage's output may move the pipeline forward.

use crate::analysis::models::StageResult;

/// Per-stage gate: minimum confidence and attempt bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagePolicy {
    pub confidence_threshold: f64,
    pub max_attempts: u32,
}

impl StagePolicy {
    pub const fn new(confidence_threshold: f64, max_attempts: u32) -> Self {
        Self {
            confidence_threshold,
            max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    /// Re-run the same stage. Never an earlier one.
    Retry,
    Fail,
}

/// `result` is `None` when the attempt produced no output (gateway or parse error).
///
/// - Continue: result present, confidence at or above threshold, nothing required missing.
/// - Retry: anything else while `attempts_so_far < max_attempts`.
/// - Fail: anything else once the bound is reached.
pub fn validate(
    result: Option<&StageResult>,
    confidence_threshold: f64,
    attempts_so_far: u32,
    max_attempts: u32,
) -> Decision {
    let acceptable = result.is_some_and(|r| {
        r.confidence >= confidence_threshold && r.missing_required().is_empty()
    });

    if acceptable {
        Decision::Continue
    } else if attempts_so_far < max_attempts {
        Decision::Retry
    } else {
        Decision::Fail
    }
}

/// Why a present result was not accepted, for the pipeline's error log.
pub fn rejection_reason(result: &StageResult, confidence_threshold: f64) -> Option<String> {
    let missing = result.missing_required();
    let low_confidence = result.confidence < confidence_threshold;

    match (low_confidence, missing.is_empty()) {
        (false, true) => None,
        (true, true) => Some(format!(
            "{} confidence {:.2} below threshold {:.2}",
            result.stage, result.confidence, confidence_threshold
        )),
        (false, false) => Some(format!(
            "{} output missing required fields: {}",
            result.stage,
            missing.join(", ")
        )),
        (true, false) => Some(format!(
            "{} confidence {:.2} below threshold {:.2}; missing required fields: {}",
            result.stage,
            result.confidence,
            confidence_threshold,
            missing.join(", ")
        )),
    }
}
