//! Orchestrator: drives one analysis through the pipeline state machine.
//!
//! Flow: Preprocessing → StructureAnalysis ⇄ StructureValidation →
//!       AppealAnalysis ⇄ AppealValidation → Aggregation → Complete,
//!       with Failed reachable from every non-terminal state.
//!
//! `AnalysisEngine` holds only configuration and the gateway handle and is shared
//! behind an `Arc`. Everything mutable lives in a `PipelineRun` created per call.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analysis::aggregator::{AggregationWeights, ResultAggregator};
use crate::analysis::appeal::AppealAnalyst;
use crate::analysis::error::{AnalysisError, AnalysisErrorKind, StageError};
use crate::analysis::gateway::ModelGateway;
use crate::analysis::industry::{Industry, UnsupportedIndustry};
use crate::analysis::models::{AnalysisResult, StageKind, StageResult};
use crate::analysis::preprocess::preprocess;
use crate::analysis::retry::BackoffPolicy;
use crate::analysis::structure::StructureAnalyst;
use crate::analysis::validator::{rejection_reason, validate, Decision, StagePolicy};

// ────────────────────────────────────────────────────────────────────────────
// State machine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Preprocessing,
    StructureAnalysis,
    StructureValidation,
    AppealAnalysis,
    AppealValidation,
    Aggregation,
    Complete,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Complete | PipelineStage::Failed)
    }

    /// The transition table. Retry edges only point back at the same stage.
    pub fn can_transition_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;

        match (self, next) {
            (Complete | Failed, _) => false,
            (_, Failed) => true,
            (Preprocessing, StructureAnalysis)
            | (StructureAnalysis, StructureValidation)
            | (StructureValidation, AppealAnalysis | StructureAnalysis)
            | (AppealAnalysis, AppealValidation)
            | (AppealValidation, Aggregation | AppealAnalysis)
            | (Aggregation, Complete) => true,
            _ => false,
        }
    }

    /// Which analysis stage a state belongs to, if any.
    pub fn stage_kind(self) -> Option<StageKind> {
        match self {
            PipelineStage::StructureAnalysis | PipelineStage::StructureValidation => {
                Some(StageKind::Structure)
            }
            PipelineStage::AppealAnalysis | PipelineStage::AppealValidation => {
                Some(StageKind::Appeal)
            }
            _ => None,
        }
    }

    fn analysis(kind: StageKind) -> Self {
        match kind {
            StageKind::Structure => PipelineStage::StructureAnalysis,
            StageKind::Appeal => PipelineStage::AppealAnalysis,
        }
    }

    fn validation(kind: StageKind) -> Self {
        match kind {
            StageKind::Structure => PipelineStage::StructureValidation,
            StageKind::Appeal => PipelineStage::AppealValidation,
        }
    }

    /// Where a stage goes once its validator says Continue.
    fn after(kind: StageKind) -> Self {
        match kind {
            StageKind::Structure => PipelineStage::AppealAnalysis,
            StageKind::Appeal => PipelineStage::Aggregation,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Preprocessing => "preprocessing",
            PipelineStage::StructureAnalysis => "structure_analysis",
            PipelineStage::StructureValidation => "structure_validation",
            PipelineStage::AppealAnalysis => "appeal_analysis",
            PipelineStage::AppealValidation => "appeal_validation",
            PipelineStage::Aggregation => "aggregation",
            PipelineStage::Complete => "complete",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only error log.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub stage: PipelineStage,
    /// Attempt of the owning analysis stage; 0 for preprocessing.
    pub attempt: u32,
    pub message: String,
}

/// Working record of one in-flight analysis. Never shared across calls.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub correlation_id: String,
    pub stage: PipelineStage,
    pub structure: Option<StageResult>,
    pub appeal: Option<StageResult>,
    pub structure_attempts: u32,
    pub appeal_attempts: u32,
    pub errors: Vec<ErrorRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Every state visited, in order, starting with Preprocessing.
    pub trace: Vec<PipelineStage>,
}

impl PipelineState {
    fn new(correlation_id: &str) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            stage: PipelineStage::Preprocessing,
            structure: None,
            appeal: None,
            structure_attempts: 0,
            appeal_attempts: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            trace: vec![PipelineStage::Preprocessing],
        }
    }

    pub fn attempts(&self, kind: StageKind) -> u32 {
        match kind {
            StageKind::Structure => self.structure_attempts,
            StageKind::Appeal => self.appeal_attempts,
        }
    }

    fn enter_attempt(&mut self, kind: StageKind) -> u32 {
        let counter = match kind {
            StageKind::Structure => &mut self.structure_attempts,
            StageKind::Appeal => &mut self.appeal_attempts,
        };
        *counter += 1;
        *counter
    }

    fn accept(&mut self, result: StageResult) {
        match result.stage {
            StageKind::Structure => self.structure = Some(result),
            StageKind::Appeal => self.appeal = Some(result),
        }
    }

    /// Error messages belonging to the same stage as `stage`.
    fn errors_for(&self, stage: PipelineStage) -> Vec<String> {
        self.errors
            .iter()
            .filter(|r| r.stage.stage_kind() == stage.stage_kind())
            .map(|r| r.message.clone())
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

/// Immutable input to one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub text: String,
    pub industry: String,
    pub correlation_id: String,
    pub deadline: Option<Instant>,
}

impl AnalysisRequest {
    pub fn new(
        text: impl Into<String>,
        industry: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            industry: industry.into(),
            correlation_id: correlation_id.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub structure: StagePolicy,
    pub appeal: StagePolicy,
    /// Bound on every single gateway call.
    pub gateway_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub weights: AggregationWeights,
    /// Bound on a whole run. The earlier of this and the request deadline wins.
    pub pipeline_deadline: Option<Duration>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            structure: StagePolicy::new(0.60, 3),
            appeal: StagePolicy::new(0.65, 3),
            gateway_timeout: Duration::from_secs(8),
            backoff: BackoffPolicy::default(),
            weights: AggregationWeights::default(),
            pipeline_deadline: Some(Duration::from_secs(60)),
        }
    }
}

impl AnalysisConfig {
    pub fn policy(&self, kind: StageKind) -> StagePolicy {
        match kind {
            StageKind::Structure => self.structure,
            StageKind::Appeal => self.appeal,
        }
    }
}

pub struct AnalysisEngine {
    gateway: Arc<dyn ModelGateway>,
    config: AnalysisConfig,
}

impl AnalysisEngine {
    pub fn new(gateway: Arc<dyn ModelGateway>, config: AnalysisConfig) -> Self {
        Self { gateway, config }
    }

    /// Runs the full pipeline. Returns the aggregated report, or the error that
    /// moved the pipeline to Failed. Partial stage results are never returned.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.run(request, cancel).await.0
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> (Result<AnalysisResult, AnalysisError>, PipelineState) {
        let mut run = PipelineRun::new(self, request, cancel);
        let outcome = run.drive().await;
        (outcome, run.state)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-call run
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

struct PipelineRun<'a> {
    engine: &'a AnalysisEngine,
    request: &'a AnalysisRequest,
    cancel: &'a CancellationToken,
    deadline: Option<Instant>,
    started: Instant,
    state: PipelineState,
    clean_text: String,
    /// Output of the latest attempt, waiting for the validator.
    candidate: Option<StageResult>,
    /// What the latest failed attempt ran into, if it produced no output.
    last_cause: Option<AnalysisErrorKind>,
}

impl<'a> PipelineRun<'a> {
    fn new(
        engine: &'a AnalysisEngine,
        request: &'a AnalysisRequest,
        cancel: &'a CancellationToken,
    ) -> Self {
        let started = Instant::now();
        let pipeline_deadline = engine
            .config
            .pipeline_deadline
            .and_then(|d| started.checked_add(d));
        let deadline = match (request.deadline, pipeline_deadline) {
            (Some(requested), Some(configured)) => Some(requested.min(configured)),
            (requested, configured) => requested.or(configured),
        };

        Self {
            engine,
            request,
            cancel,
            deadline,
            started,
            state: PipelineState::new(&request.correlation_id),
            clean_text: String::new(),
            candidate: None,
            last_cause: None,
        }
    }

    fn id(&self) -> &str {
        &self.state.correlation_id
    }

    async fn drive(&mut self) -> Result<AnalysisResult, AnalysisError> {
        info!(
            "[{}] Starting analysis (industry={}, {} chars)",
            self.id(),
            self.request.industry,
            self.request.text.chars().count()
        );

        loop {
            if let Err(interrupt) = self.check_interrupt() {
                return Err(self.interrupted(interrupt));
            }

            match self.state.stage {
                PipelineStage::Preprocessing => self.preprocess()?,
                PipelineStage::StructureAnalysis => self.attempt(StageKind::Structure).await?,
                PipelineStage::StructureValidation => self.validate(StageKind::Structure).await?,
                PipelineStage::AppealAnalysis => self.attempt(StageKind::Appeal).await?,
                PipelineStage::AppealValidation => self.validate(StageKind::Appeal).await?,
                PipelineStage::Aggregation => return Ok(self.aggregate()),
                stage @ (PipelineStage::Complete | PipelineStage::Failed) => {
                    unreachable!("pipeline loop re-entered terminal stage {stage}")
                }
            }
        }
    }

    // ── transitions ─────────────────────────────────────────────────────────

    fn advance(&mut self, next: PipelineStage) {
        let from = self.state.stage;
        if !from.can_transition_to(next) {
            error!("[{}] Illegal transition {} -> {}", self.id(), from, next);
            debug_assert!(false, "illegal transition {from} -> {next}");
        }
        debug!("[{}] {} -> {}", self.id(), from, next);
        self.state.stage = next;
        self.state.trace.push(next);
    }

    fn record(&mut self, attempt: u32, message: impl Into<String>) {
        let record = ErrorRecord {
            stage: self.state.stage,
            attempt,
            message: message.into(),
        };
        debug!(
            "[{}] Error logged in {} (attempt {}): {}",
            self.id(),
            record.stage,
            record.attempt,
            record.message
        );
        self.state.errors.push(record);
    }

    /// Start/end timestamps and the visited states, for diagnostics.
    fn log_trace(&self) {
        let trace = self
            .state
            .trace
            .iter()
            .map(|stage| stage.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        let finished = self
            .state
            .completed_at
            .map_or_else(|| "-".to_string(), |at| at.to_rfc3339());
        info!(
            "[{}] Pipeline trace ({} .. {}): {}",
            self.id(),
            self.state.started_at.to_rfc3339(),
            finished,
            trace
        );
    }

    /// Moves to Failed, discards partial results and builds the caller's error
    /// from the failing stage's log only.
    fn fail(&mut self, kind: AnalysisErrorKind, message: impl Into<String>) -> AnalysisError {
        let failing = self.state.stage;
        debug_assert!(!failing.is_terminal(), "fail() called in terminal stage {failing}");
        let details = self.state.errors_for(failing);

        self.advance(PipelineStage::Failed);
        self.state.completed_at = Some(Utc::now());
        self.state.structure = None;
        self.state.appeal = None;
        self.candidate = None;

        let mut err = AnalysisError::new(kind, message, self.id()).with_details(details);
        if kind == AnalysisErrorKind::RetriesExhausted {
            if let Some(cause) = self.last_cause {
                err = err.with_last_cause(cause);
            }
        }

        error!(
            "[{}] Analysis failed in {} after {:?}: {}",
            self.id(),
            failing,
            self.started.elapsed(),
            err.message
        );
        self.log_trace();
        err
    }

    // ── cancellation ────────────────────────────────────────────────────────

    fn check_interrupt(&self) -> Result<(), Interrupt> {
        if self.cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        if self.deadline.is_some_and(|at| Instant::now() >= at) {
            return Err(Interrupt::DeadlineExceeded);
        }
        Ok(())
    }

    /// Races `fut` against cancellation and the deadline. Losing drops `fut`,
    /// which aborts an in-flight gateway call or backoff sleep.
    async fn guarded<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = wait_for_deadline(self.deadline) => Err(Interrupt::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    fn interrupted(&mut self, interrupt: Interrupt) -> AnalysisError {
        let stage = self.state.stage;
        let message = match interrupt {
            Interrupt::Cancelled => format!("analysis cancelled during {stage}"),
            Interrupt::DeadlineExceeded => format!("analysis deadline exceeded during {stage}"),
        };
        let attempt = stage.stage_kind().map_or(0, |k| self.state.attempts(k));
        self.record(attempt, message.clone());
        self.fail(AnalysisErrorKind::Cancelled, message)
    }

    // ── stages ──────────────────────────────────────────────────────────────

    fn preprocess(&mut self) -> Result<(), AnalysisError> {
        let checked = preprocess(&self.request.text).and_then(|clean| {
            self.request
                .industry
                .parse::<Industry>()
                .map_err(|e: UnsupportedIndustry| StageError::Validation(e.to_string()))?;
            Ok(clean)
        });

        match checked {
            Ok(clean) => {
                debug!(
                    "[{}] Preprocessed text: {} chars",
                    self.id(),
                    clean.chars().count()
                );
                self.clean_text = clean;
                self.advance(PipelineStage::StructureAnalysis);
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.record(0, message.clone());
                Err(self.fail(err.kind(), message))
            }
        }
    }

    /// One analyst attempt. Gateway and parse errors are logged and left to the
    /// validator; validation errors and interrupts end the run.
    async fn attempt(&mut self, kind: StageKind) -> Result<(), AnalysisError> {
        let attempt = self.state.enter_attempt(kind);
        let max_attempts = self.engine.config.policy(kind).max_attempts;
        self.candidate = None;
        info!(
            "[{}] {} analysis attempt {}/{}",
            self.id(),
            kind,
            attempt,
            max_attempts
        );

        let engine = self.engine;
        let gateway = engine.gateway.as_ref();
        let call_timeout = engine.config.gateway_timeout;
        let outcome = match kind {
            StageKind::Structure => {
                let analyst = StructureAnalyst::new(gateway, call_timeout);
                self.guarded(analyst.analyze(&self.clean_text)).await
            }
            StageKind::Appeal => {
                let Some(context) = self.state.structure.as_ref() else {
                    unreachable!("appeal analysis entered without an accepted structure result")
                };
                let analyst = AppealAnalyst::new(gateway, call_timeout);
                self.guarded(analyst.analyze(&self.clean_text, &self.request.industry, context))
                    .await
            }
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(interrupt) => return Err(self.interrupted(interrupt)),
        };

        match outcome {
            Ok(mut result) => {
                result.metadata.attempt = attempt;
                debug!(
                    "[{}] {} attempt {} produced confidence {:.2} in {}ms",
                    self.id(),
                    kind,
                    attempt,
                    result.confidence,
                    result.metadata.duration_ms
                );
                self.candidate = Some(result);
                self.last_cause = None;
            }
            Err(StageError::Validation(message)) => {
                self.record(attempt, message.clone());
                return Err(self.fail(AnalysisErrorKind::ValidationError, message));
            }
            Err(err) => {
                warn!(
                    "[{}] {} attempt {}/{} failed: {}",
                    self.id(),
                    kind,
                    attempt,
                    max_attempts,
                    err
                );
                self.last_cause = Some(err.kind());
                self.record(attempt, err.to_string());
            }
        }

        self.advance(PipelineStage::validation(kind));
        Ok(())
    }

    async fn validate(&mut self, kind: StageKind) -> Result<(), AnalysisError> {
        let policy = self.engine.config.policy(kind);
        let attempts = self.state.attempts(kind);
        let decision = validate(
            self.candidate.as_ref(),
            policy.confidence_threshold,
            attempts,
            policy.max_attempts,
        );

        if decision != Decision::Continue {
            let reason = self
                .candidate
                .as_ref()
                .and_then(|r| rejection_reason(r, policy.confidence_threshold));
            if let Some(reason) = reason {
                self.last_cause = None;
                self.record(attempts, reason);
            }
        }

        match decision {
            Decision::Continue => {
                if let Some(result) = self.candidate.take() {
                    info!(
                        "[{}] {} stage accepted on attempt {} (confidence {:.2})",
                        self.id(),
                        kind,
                        attempts,
                        result.confidence
                    );
                    self.state.accept(result);
                }
                self.advance(PipelineStage::after(kind));
            }
            Decision::Retry => {
                let delay = self.engine.config.backoff.delay_for_retry(attempts);
                warn!(
                    "[{}] {} attempt {}/{} rejected, retrying in {:?}",
                    self.id(),
                    kind,
                    attempts,
                    policy.max_attempts,
                    delay
                );
                if let Err(interrupt) = self.guarded(tokio::time::sleep(delay)).await {
                    return Err(self.interrupted(interrupt));
                }
                self.advance(PipelineStage::analysis(kind));
            }
            Decision::Fail => {
                let message = format!("{kind} stage failed after {attempts} attempts");
                return Err(self.fail(AnalysisErrorKind::RetriesExhausted, message));
            }
        }
        Ok(())
    }

    fn aggregate(&mut self) -> AnalysisResult {
        let (Some(structure), Some(appeal)) = (self.state.structure.take(), self.state.appeal.take())
        else {
            unreachable!("aggregation entered without both accepted stage results")
        };

        let aggregator = ResultAggregator::new(self.engine.config.weights);
        let result = aggregator.aggregate(structure, appeal, self.started.elapsed());

        self.advance(PipelineStage::Complete);
        self.state.completed_at = Some(Utc::now());
        info!(
            "[{}] Analysis complete: score {:.2}, tier {}, {}ms (attempts: structure={}, appeal={})",
            self.id(),
            result.overall_score,
            result.market_tier,
            result.processing_ms,
            self.state.structure_attempts,
            self.state.appeal_attempts
        );
        self.log_trace();
        result
    }
}
