//! Per-model audit records via the EvalSink trait.
//!
//! The executor reports every `(model, task)` attempt through an EvalSink.
//! This decouples the engine from any specific destination:
//! - services wire in their own sink (metrics pipeline, table, …)
//! - CLI tools use NoopSink or StderrSink
//! - tests use NoopSink or a capturing sink

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Status of a judge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Record of one judge-model call within an evaluation.
#[derive(Debug, Clone)]
pub struct ModelCallRecord {
    /// Evaluation this call belonged to.
    pub evaluation_id: Uuid,
    /// Judge model invoked.
    pub model: String,
    /// Provider the model resolved to, if resolution succeeded.
    pub provider: Option<String>,
    /// Metric slug from the task.
    pub metric: String,
    /// Call status.
    pub status: CallStatus,
    /// Error code if status is Error.
    pub error_code: Option<&'static str>,
    /// Score the judge produced, on success.
    pub score: Option<f64>,
    /// Call latency in milliseconds, admission wait excluded.
    pub latency_ms: i64,
    /// Time spent waiting on the provider's bucket, in milliseconds.
    pub admission_wait_ms: i64,
    /// When the call completed.
    pub timestamp: DateTime<Utc>,
}

impl ModelCallRecord {
    pub fn new(evaluation_id: Uuid, model: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            evaluation_id,
            model: model.into(),
            provider: None,
            metric: metric.into(),
            status: CallStatus::Success,
            error_code: None,
            score: None,
            latency_ms: 0,
            admission_wait_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn latency(mut self, ms: i64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn admission_wait(mut self, ms: i64) -> Self {
        self.admission_wait_ms = ms;
        self
    }

    pub fn error(mut self, code: &'static str) -> Self {
        self.status = CallStatus::Error;
        self.error_code = Some(code);
        self
    }
}

/// Trait for recording judge-call audit detail.
///
/// Fire-and-forget: implementations log their own failures and never
/// propagate them into the evaluation.
#[async_trait]
pub trait EvalSink: Send + Sync {
    async fn record(&self, record: ModelCallRecord);
}

/// No-op sink that discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl EvalSink for NoopSink {
    async fn record(&self, _record: ModelCallRecord) {
        // Discard
    }
}

/// Sink that writes one JSON line per call to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

#[async_trait]
impl EvalSink for StderrSink {
    async fn record(&self, record: ModelCallRecord) {
        eprintln!(
            r#"{{"evaluation_id":"{}","model":"{}","provider":"{}","metric":"{}","status":"{}","error":"{}","score":{},"latency_ms":{},"admission_wait_ms":{}}}"#,
            record.evaluation_id,
            record.model,
            record.provider.as_deref().unwrap_or("-"),
            record.metric,
            record.status.as_str(),
            record.error_code.unwrap_or("-"),
            record.score.map_or_else(|| "null".to_string(), |s| s.to_string()),
            record.latency_ms,
            record.admission_wait_ms,
        );
    }
}
