use std::str::FromStr;
use std::time::Duration;

use anyhow::{ensure, Context, Result};

use crate::analysis::aggregator::AggregationWeights;
use crate::analysis::orchestrator::AnalysisConfig;
use crate::analysis::retry::BackoffPolicy;
use crate::analysis::validator::StagePolicy;

/// Longest accepted PIPELINE_DEADLINE_SECS (one day).
const MAX_PIPELINE_DEADLINE_SECS: u64 = 24 * 60 * 60;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or any value is out of range.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub analysis: AnalysisConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(lookup);

        let pipeline_deadline_secs: u64 = env.optional("PIPELINE_DEADLINE_SECS", 60)?;

        let analysis = AnalysisConfig {
            structure: StagePolicy::new(
                env.optional("STRUCTURE_CONFIDENCE_THRESHOLD", 0.60)?,
                env.optional("STRUCTURE_MAX_ATTEMPTS", 3)?,
            ),
            appeal: StagePolicy::new(
                env.optional("APPEAL_CONFIDENCE_THRESHOLD", 0.65)?,
                env.optional("APPEAL_MAX_ATTEMPTS", 3)?,
            ),
            gateway_timeout: Duration::from_secs(env.optional("GATEWAY_TIMEOUT_SECS", 8)?),
            backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(env.optional("RETRY_BACKOFF_MS", 500)?),
                multiplier: env.optional("RETRY_BACKOFF_MULTIPLIER", 2.0)?,
                max_delay: Duration::from_millis(env.optional("RETRY_BACKOFF_MAX_MS", 4000)?),
            },
            weights: AggregationWeights {
                structure: env.optional("STRUCTURE_WEIGHT", 0.35)?,
                appeal: env.optional("APPEAL_WEIGHT", 0.65)?,
            },
            // 0 disables the whole-run bound
            pipeline_deadline: (pipeline_deadline_secs > 0)
                .then(|| Duration::from_secs(pipeline_deadline_secs)),
        };

        let config = Config {
            anthropic_api_key: env.require("ANTHROPIC_API_KEY")?,
            port: env
                .optional("PORT", 8080)
                .context("PORT must be a valid port number")?,
            rust_log: env.optional("RUST_LOG", "info".to_string())?,
            analysis,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, policy) in [
            ("STRUCTURE", self.analysis.structure),
            ("APPEAL", self.analysis.appeal),
        ] {
            ensure!(
                (0.0..=1.0).contains(&policy.confidence_threshold),
                "{name}_CONFIDENCE_THRESHOLD must be between 0 and 1, got {}",
                policy.confidence_threshold
            );
            ensure!(
                policy.max_attempts >= 1,
                "{name}_MAX_ATTEMPTS must be at least 1"
            );
        }

        ensure!(
            !self.analysis.gateway_timeout.is_zero(),
            "GATEWAY_TIMEOUT_SECS must be greater than 0"
        );

        if let Some(deadline) = self.analysis.pipeline_deadline {
            ensure!(
                deadline.as_secs() <= MAX_PIPELINE_DEADLINE_SECS,
                "PIPELINE_DEADLINE_SECS must be at most {MAX_PIPELINE_DEADLINE_SECS}, got {}",
                deadline.as_secs()
            );
        }

        let backoff = &self.analysis.backoff;
        ensure!(
            backoff.multiplier.is_finite() && backoff.multiplier >= 1.0,
            "RETRY_BACKOFF_MULTIPLIER must be at least 1.0, got {}",
            backoff.multiplier
        );
        ensure!(
            backoff.max_delay >= backoff.initial_delay,
            "RETRY_BACKOFF_MAX_MS must not be below RETRY_BACKOFF_MS"
        );

        self.analysis
            .weights
            .validate()
            .map_err(|msg| anyhow::anyhow!("STRUCTURE_WEIGHT/APPEAL_WEIGHT: {msg}"))?;

        Ok(())
    }
}

/// Variable lookup, abstracted so tests never touch the process environment.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn require(&self, key: &str) -> Result<String> {
        (self.0)(key)
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn optional<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match (self.0)(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
            _ => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_only_api_key_set() {
        let config = load(&[("ANTHROPIC_API_KEY", "sk-test")]).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.analysis.structure, StagePolicy::new(0.60, 3));
        assert_eq!(config.analysis.appeal, StagePolicy::new(0.65, 3));
        assert_eq!(config.analysis.gateway_timeout, Duration::from_secs(8));
        assert_eq!(config.analysis.backoff, BackoffPolicy::default());
        assert_eq!(config.analysis.weights, AggregationWeights::default());
        assert_eq!(
            config.analysis.pipeline_deadline,
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = load(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("PORT", "9000"),
            ("APPEAL_CONFIDENCE_THRESHOLD", "0.8"),
            ("APPEAL_MAX_ATTEMPTS", "5"),
            ("RETRY_BACKOFF_MS", "100"),
            ("RETRY_BACKOFF_MULTIPLIER", "1"),
            ("STRUCTURE_WEIGHT", "0.5"),
            ("APPEAL_WEIGHT", "0.5"),
            ("PIPELINE_DEADLINE_SECS", "0"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.analysis.appeal, StagePolicy::new(0.8, 5));
        assert_eq!(config.analysis.backoff.initial_delay, Duration::from_millis(100));
        assert_eq!(config.analysis.backoff.multiplier, 1.0);
        assert_eq!(config.analysis.weights.structure, 0.5);
        assert_eq!(config.analysis.pipeline_deadline, None);
    }

    #[test]
    fn test_unparseable_value_names_the_variable() {
        let err = load(&[("ANTHROPIC_API_KEY", "sk-test"), ("APPEAL_MAX_ATTEMPTS", "lots")])
            .unwrap_err();
        assert!(format!("{err:#}").contains("APPEAL_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let cases: &[(&str, &str, &str)] = &[
            ("STRUCTURE_CONFIDENCE_THRESHOLD", "1.5", "between 0 and 1"),
            ("APPEAL_MAX_ATTEMPTS", "0", "at least 1"),
            ("RETRY_BACKOFF_MULTIPLIER", "0.5", "at least 1.0"),
            ("STRUCTURE_WEIGHT", "0.6", "sum to 1.0"),
            ("GATEWAY_TIMEOUT_SECS", "0", "greater than 0"),
            ("PIPELINE_DEADLINE_SECS", "18446744073709551615", "at most 86400"),
        ];
        for &(key, value, expected) in cases {
            let err = load(&[("ANTHROPIC_API_KEY", "sk-test"), (key, value)]).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{key}={value}: {err}"
            );
        }
    }
}
