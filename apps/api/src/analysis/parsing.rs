//! Maps raw model text onto a `StageResult`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::analysis::confidence::{compute_confidence, ConfidenceSignals, ResponseForm};
use crate::analysis::error::StageError;
use crate::analysis::gateway::ModelOutput;
use crate::analysis::models::{MarketTier, StageKind, StageMetadata, StageResult};
use crate::llm_client::strip_json_fences;

/// Finds the JSON object in a model response and reports how it was delivered.
pub fn extract_json_object(raw: &str) -> Result<(Map<String, Value>, ResponseForm), StageError> {
    let trimmed = raw.trim();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Ok((map, ResponseForm::Bare));
    }

    let unfenced = strip_json_fences(trimmed);
    if unfenced.len() != trimmed.len() {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(unfenced) {
            return Ok((map, ResponseForm::Fenced));
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return Ok((map, ResponseForm::Embedded));
            }
        }
    }

    Err(StageError::Parse(format!(
        "no JSON object found in model output ({} chars): {:?}",
        raw.len(),
        raw.chars().take(80).collect::<String>()
    )))
}

#[derive(Debug, Default)]
struct ScoreReadout {
    scores: BTreeMap<String, f64>,
    out_of_range: usize,
}

/// Reads the required numeric sub-scores. Non-numeric values are skipped;
/// out-of-range values are clamped and counted.
fn read_scores(scores: &Map<String, Value>, keys: &[&str]) -> ScoreReadout {
    let mut readout = ScoreReadout::default();
    for key in keys {
        let Some(value) = scores.get(*key).and_then(Value::as_f64) else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }
        if !(0.0..=100.0).contains(&value) {
            readout.out_of_range += 1;
        }
        readout.scores.insert(key.to_string(), value.clamp(0.0, 100.0));
    }
    readout
}

/// Reads an array of strings, dropping non-strings and blanks.
fn read_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Builds a `StageResult` (with locally computed confidence) from raw model output.
///
/// Fails with `Parse` when there is no JSON object, no `scores` object, or not
/// a single usable required sub-score. Partially filled output parses fine and
/// is left to the validator via its lower confidence.
pub fn parse_stage_output(
    stage: StageKind,
    output: &ModelOutput,
    elapsed: Duration,
) -> Result<StageResult, StageError> {
    let (object, form) = extract_json_object(&output.text)?;

    let scores_object = object
        .get("scores")
        .and_then(Value::as_object)
        .ok_or_else(|| StageError::Parse("model output has no 'scores' object".to_string()))?;

    let required = stage.required_scores();
    let readout = read_scores(scores_object, required);
    if readout.scores.is_empty() {
        return Err(StageError::Parse(format!(
            "none of the {stage} sub-scores ({}) were numeric",
            required.join(", ")
        )));
    }

    let market_tier = if stage.requires_market_tier() {
        object
            .get("market_tier")
            .and_then(Value::as_str)
            .and_then(MarketTier::parse_lenient)
    } else {
        None
    };

    let issues = read_list(&object, "issues");
    let recommendations = read_list(&object, "recommendations");
    let missing_items = read_list(&object, "missing_items");
    let strengths = read_list(&object, "strengths");

    let mut required_fields = required.len();
    let mut valid_fields = readout.scores.len() - readout.out_of_range;
    if stage.requires_market_tier() {
        required_fields += 1;
        if market_tier.is_some() {
            valid_fields += 1;
        }
    }

    let flat_scores = readout.scores.len() == required.len() && {
        let mut values = readout.scores.values();
        let first = values.next().copied().unwrap_or_default();
        values.all(|v| (*v - first).abs() < f64::EPSILON)
    };

    let confidence = compute_confidence(&ConfidenceSignals {
        required_fields,
        valid_fields,
        feedback_lists_filled: [&issues, &recommendations, &strengths]
            .iter()
            .filter(|list| !list.is_empty())
            .count(),
        form,
        flat_scores,
    });

    Ok(StageResult {
        stage,
        confidence,
        sub_scores: readout.scores,
        issues,
        recommendations,
        missing_items,
        strengths,
        market_tier,
        metadata: StageMetadata {
            duration_ms: elapsed.as_millis() as u64,
            model: output.model.clone(),
            attempt: 1,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{appeal_json, structure_json};

    fn output(text: &str) -> ModelOutput {
        ModelOutput {
            text: text.to_string(),
            model: "test-model".to_string(),
        }
    }

    #[test]
    fn test_extract_bare_object() {
        let (map, form) = extract_json_object(r#" {"a": 1} "#).unwrap();
        assert_eq!(form, ResponseForm::Bare);
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn test_extract_fenced_object() {
        let (_, form) = extract_json_object("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(form, ResponseForm::Fenced);
    }

    #[test]
    fn test_extract_object_embedded_in_prose() {
        let (map, form) =
            extract_json_object("Sure! Here is the review:\n{\"a\": {\"b\": 2}}\nHope it helps.")
                .unwrap();
        assert_eq!(form, ResponseForm::Embedded);
        assert_eq!(map["a"]["b"], 2);
    }

    #[test]
    fn test_extract_rejects_non_object() {
        assert!(matches!(
            extract_json_object("[1, 2, 3]"),
            Err(StageError::Parse(_))
        ));
        assert!(matches!(
            extract_json_object("I cannot help with that."),
            Err(StageError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_well_formed_structure_output() {
        let result = parse_stage_output(
            StageKind::Structure,
            &output(&structure_json()),
            Duration::from_millis(120),
        )
        .unwrap();

        assert_eq!(result.stage, StageKind::Structure);
        assert_eq!(result.sub_scores.len(), 4);
        assert_eq!(result.confidence, 1.0);
        assert!(result.missing_required().is_empty());
        assert_eq!(result.metadata.duration_ms, 120);
        assert_eq!(result.metadata.model, "test-model");
        assert!(result.market_tier.is_none());
    }

    #[test]
    fn test_parse_well_formed_appeal_output_reads_tier() {
        let result = parse_stage_output(
            StageKind::Appeal,
            &output(&appeal_json("senior")),
            Duration::from_millis(5),
        )
        .unwrap();
        assert_eq!(result.market_tier, Some(MarketTier::Senior));
        assert_eq!(result.confidence, 1.0);
        assert!(result.missing_required().is_empty());
    }

    #[test]
    fn test_unknown_tier_lowers_appeal_confidence() {
        let result = parse_stage_output(
            StageKind::Appeal,
            &output(&appeal_json("rockstar")),
            Duration::ZERO,
        )
        .unwrap();
        assert!(result.market_tier.is_none());
        assert!(result.confidence < 1.0);
        assert_eq!(result.missing_required(), vec!["market_tier"]);
    }

    #[test]
    fn test_missing_scores_object_is_parse_error() {
        let err = parse_stage_output(
            StageKind::Structure,
            &output(r#"{"issues": ["x"]}"#),
            Duration::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, StageError::Parse(_)));
    }

    #[test]
    fn test_non_numeric_scores_is_parse_error() {
        let err = parse_stage_output(
            StageKind::Structure,
            &output(r#"{"scores": {"format": "good", "tone": null}}"#),
            Duration::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, StageError::Parse(_)));
    }

    #[test]
    fn test_partial_scores_parse_with_lower_confidence() {
        let result = parse_stage_output(
            StageKind::Structure,
            &output(r#"{"scores": {"format": 80, "tone": 65}, "issues": ["x"]}"#),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(result.missing_required(), vec!["organization", "completeness"]);
        // 0.5*(2/4) + 0.2*(1/3) + 0.3
        assert!((result.confidence - 0.6167).abs() < 1e-9, "got {}", result.confidence);
    }

    #[test]
    fn test_out_of_range_scores_are_clamped_and_penalized() {
        let result = parse_stage_output(
            StageKind::Structure,
            &output(
                r#"{"scores": {"format": 140, "organization": 70, "tone": -5, "completeness": 60},
                    "issues": ["a"], "recommendations": ["b"], "strengths": ["c"]}"#,
            ),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(result.sub_scores["format"], 100.0);
        assert_eq!(result.sub_scores["tone"], 0.0);
        // 0.5*(2/4) + 0.2 + 0.3 = 0.75
        assert!((result.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_blank_and_non_string_list_items_dropped() {
        let result = parse_stage_output(
            StageKind::Structure,
            &output(
                r#"{"scores": {"format": 80, "organization": 70, "tone": 60, "completeness": 50},
                    "strengths": ["  ", 3, "Clear headings "]}"#,
            ),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(result.strengths, vec!["Clear headings".to_string()]);
    }
}
