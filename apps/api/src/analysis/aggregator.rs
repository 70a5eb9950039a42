//! Result Aggregator: folds the two accepted stage results into the final report.
//!
//! Pure for fixed inputs. No model call, no failure path.

use std::collections::HashSet;
use std::time::Duration;

use crate::analysis::models::{AnalysisResult, MarketTier, StageResult};

/// Max strengths / issues quoted in the executive summary.
const SUMMARY_ITEMS: usize = 3;

/// Relative weight of each stage in the overall score. Must be non-negative and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationWeights {
    pub structure: f64,
    pub appeal: f64,
}

impl Default for AggregationWeights {
    fn default() -> Self {
        Self {
            structure: 0.35,
            appeal: 0.65,
        }
    }
}

impl AggregationWeights {
    pub fn validate(&self) -> Result<(), String> {
        if self.structure < 0.0 || self.appeal < 0.0 {
            return Err(format!(
                "stage weights must be non-negative (structure={}, appeal={})",
                self.structure, self.appeal
            ));
        }
        let total = self.structure + self.appeal;
        if (total - 1.0).abs() > 1e-6 {
            return Err(format!("stage weights must sum to 1.0, got {total}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    weights: AggregationWeights,
}

impl ResultAggregator {
    pub fn new(weights: AggregationWeights) -> Self {
        Self { weights }
    }

    /// `elapsed` is the wall-clock pipeline time measured by the caller.
    pub fn aggregate(
        &self,
        structure: StageResult,
        appeal: StageResult,
        elapsed: Duration,
    ) -> AnalysisResult {
        let structure_avg = structure.average_score();
        let appeal_avg = appeal.average_score();

        let weighted = self.weights.structure * structure_avg + self.weights.appeal * appeal_avg;
        let overall_score = round2(weighted).clamp(0.0, 100.0);

        let market_tier = appeal
            .market_tier
            .unwrap_or_else(|| MarketTier::from_score(appeal_avg));

        let executive_summary = build_summary(overall_score, market_tier, &structure, &appeal);

        AnalysisResult {
            overall_score,
            market_tier,
            structure,
            appeal,
            executive_summary,
            processing_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Appeal items first, then structure; case-insensitive de-duplication.
fn top_items<'a>(first: &'a [String], second: &'a [String], limit: usize) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(second)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(limit)
        .collect()
}

fn build_summary(
    overall_score: f64,
    tier: MarketTier,
    structure: &StageResult,
    appeal: &StageResult,
) -> String {
    let mut parts = vec![format!(
        "Overall score {overall_score:.2}/100 ({tier} tier)."
    )];

    let strengths = top_items(&appeal.strengths, &structure.strengths, SUMMARY_ITEMS);
    if !strengths.is_empty() {
        parts.push(format!("Key strengths: {}.", strengths.join("; ")));
    }

    let issues = top_items(&appeal.issues, &structure.issues, SUMMARY_ITEMS);
    if !issues.is_empty() {
        parts.push(format!("Priority issues: {}.", issues.join("; ")));
    }

    if let Some(top) = top_items(&appeal.recommendations, &structure.recommendations, 1).first() {
        parts.push(format!("Top recommendation: {top}."));
    }

    parts.join(" ")
}
