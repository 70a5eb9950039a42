//! Data model shared by every pipeline stage.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Stage kinds
// ────────────────────────────────────────────────────────────────────────────

/// The two sequential analysis stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Structure,
    Appeal,
}

const STRUCTURE_SCORES: &[&str] = &["format", "organization", "tone", "completeness"];

const APPEAL_SCORES: &[&str] = &[
    "achievement_relevance",
    "skills_alignment",
    "experience_fit",
    "competitive_positioning",
];

impl StageKind {
    /// Sub-score keys this stage must produce before it may continue.
    pub fn required_scores(self) -> &'static [&'static str] {
        match self {
            StageKind::Structure => STRUCTURE_SCORES,
            StageKind::Appeal => APPEAL_SCORES,
        }
    }

    /// Only the appeal stage has the industry context to estimate seniority.
    pub fn requires_market_tier(self) -> bool {
        matches!(self, StageKind::Appeal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Structure => "structure",
            StageKind::Appeal => "appeal",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Market tier
// ────────────────────────────────────────────────────────────────────────────

/// Coarse seniority classification, ordered from least to most senior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketTier {
    Entry,
    Mid,
    Senior,
    Executive,
}

impl MarketTier {
    pub const ALL: [MarketTier; 4] = [
        MarketTier::Entry,
        MarketTier::Mid,
        MarketTier::Senior,
        MarketTier::Executive,
    ];

    /// Maps the spellings models actually use ("mid-level", "Staff", "VP") onto a tier.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();

        match normalized.as_str() {
            "entry" | "entry-level" | "junior" | "graduate" | "intern" => Some(MarketTier::Entry),
            "mid" | "mid-level" | "midlevel" | "intermediate" => Some(MarketTier::Mid),
            "senior" | "senior-level" | "lead" | "staff" | "principal" => Some(MarketTier::Senior),
            "executive" | "director" | "vp" | "c-level" | "chief" => Some(MarketTier::Executive),
            _ => None,
        }
    }

    /// Fallback classification from an appeal average (0–100).
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 85.0 => MarketTier::Executive,
            s if s >= 70.0 => MarketTier::Senior,
            s if s >= 50.0 => MarketTier::Mid,
            _ => MarketTier::Entry,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarketTier::Entry => "entry",
            MarketTier::Mid => "mid",
            MarketTier::Senior => "senior",
            MarketTier::Executive => "executive",
        }
    }
}

impl fmt::Display for MarketTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetadata {
    pub duration_ms: u64,
    pub model: String,
    /// 1-based attempt that produced this result.
    pub attempt: u32,
}

/// Output of one analyst for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageKind,
    /// Locally computed quality signal, 0.0 – 1.0.
    pub confidence: f64,
    /// Each 0 – 100. BTreeMap keeps serialization order stable.
    pub sub_scores: BTreeMap<String, f64>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub missing_items: Vec<String>,
    pub strengths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_tier: Option<MarketTier>,
    pub metadata: StageMetadata,
}

impl StageResult {
    /// Required fields (sub-scores, plus the tier for appeal) this result lacks.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing: Vec<&'static str> = self
            .stage
            .required_scores()
            .iter()
            .copied()
            .filter(|key| !self.sub_scores.contains_key(*key))
            .collect();

        if self.stage.requires_market_tier() && self.market_tier.is_none() {
            missing.push("market_tier");
        }
        missing
    }

    /// Mean of the stage's required sub-scores. Missing keys count as 0.
    pub fn average_score(&self) -> f64 {
        let keys = self.stage.required_scores();
        let total: f64 = keys
            .iter()
            .map(|key| self.sub_scores.get(*key).copied().unwrap_or(0.0))
            .sum();
        total / keys.len() as f64
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Terminal output
// ────────────────────────────────────────────────────────────────────────────

/// Final report handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// 0 – 100, rounded to two decimals.
    pub overall_score: f64,
    pub market_tier: MarketTier,
    pub structure: StageResult,
    pub appeal: StageResult,
    pub executive_summary: String,
    pub processing_ms: u64,
}
