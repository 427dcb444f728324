//! Task and result types for multi-model evaluation.

use std::collections::BTreeMap;
use std::time::Duration;

/// An opaque, immutable unit of evaluation work.
///
/// The engine passes the payload to the invoker unmodified and never inspects
/// it; its shape is a contract between metric code and its invoker. All
/// models in one fan-out share the same task instance.
#[derive(Debug, Clone)]
pub struct EvaluationTask {
    /// Metric slug, e.g. "faithfulness" or "goal_accuracy". Used for audit
    /// records only.
    pub metric: String,
    /// Metric-specific prompt/sample payload.
    pub payload: serde_json::Value,
}

impl EvaluationTask {
    pub fn new(metric: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            metric: metric.into(),
            payload,
        }
    }
}

/// Why one model produced no score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Admission was denied (REJECT) or timed out (WAIT).
    RateLimited,
    /// The model has no provider mapping. Detected before admission.
    UnknownProvider,
    /// The fan-out was cancelled before this model ran.
    Cancelled,
    /// The invoker failed or returned an unscorable outcome.
    Invocation(String),
}

impl FailureKind {
    /// Short code for audit records and logs.
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::UnknownProvider => "unknown_provider",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Invocation(_) => "invocation_error",
        }
    }
}

/// Outcome of one model's evaluation. Immutable once constructed.
///
/// `duration` runs from admission-token acquisition to completion; time spent
/// waiting on the bucket is excluded by contract.
#[derive(Debug, Clone)]
pub enum ModelResult {
    Success {
        score: f64,
        explanation: Option<String>,
        duration: Duration,
    },
    Failure {
        reason: FailureKind,
        duration: Duration,
    },
}

impl ModelResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ModelResult::Success { .. })
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            ModelResult::Success { score, .. } => Some(*score),
            ModelResult::Failure { .. } => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            ModelResult::Success { duration, .. } | ModelResult::Failure { duration, .. } => {
                *duration
            }
        }
    }
}

/// Why `EvaluationResult::score` is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreUndefinedReason {
    /// Every model failed; there was nothing to aggregate.
    NoModelSucceeded,
    /// CONSENSUS found disagreeing scores.
    ConsensusDisagreement,
}

/// Aggregate outcome of one fan-out.
///
/// Invariant: every requested model appears in `model_results` exactly once,
/// and `excluded_models` is exactly the set of models whose result is
/// `Failure`. Callers must check `score` rather than rely on an error: a
/// fully-failed evaluation still returns normally, with the failure detail
/// carried as data.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    /// Aggregated score, absent when undefined (see `score_undefined`).
    pub score: Option<f64>,
    /// Per-model detail, ordered by model name.
    pub model_results: BTreeMap<String, ModelResult>,
    /// Models whose result is a failure, sorted by name.
    pub excluded_models: Vec<String>,
    /// Wall clock of the whole fan-out, admission waits included.
    pub duration: Duration,
    /// Set exactly when `score` is `None`.
    pub score_undefined: Option<ScoreUndefinedReason>,
}

impl EvaluationResult {
    /// Models that produced a score, in name order.
    pub fn scored_models(&self) -> Vec<&str> {
        self.model_results
            .iter()
            .filter(|(_, result)| result.is_success())
            .map(|(model, _)| model.as_str())
            .collect()
    }
}
