//! The opaque judge-model boundary.
//!
//! Metric code supplies a [`ModelInvoker`] at engine construction; prompt
//! construction, transport, authentication, and response parsing all live
//! behind it. The engine only sees a score or a typed error.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::execute::EvaluationTask;

/// A judge model's verdict on one task.
#[derive(Debug, Clone)]
pub struct JudgeOutcome {
    pub score: f64,
    pub explanation: Option<String>,
}

impl JudgeOutcome {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            explanation: None,
        }
    }

    pub fn explained(score: f64, explanation: impl Into<String>) -> Self {
        Self {
            score,
            explanation: Some(explanation.into()),
        }
    }
}

/// Errors an invoker may surface. All of them are converted to per-model
/// failure data by the task runner; none aborts sibling models.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The upstream provider rejected or failed the call.
    #[error("{provider} error: {message}")]
    Provider {
        provider: String,
        message: String,
        retryable: bool,
    },

    /// The call did not complete in time.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The judge answered, but not in a shape the metric could score.
    #[error("malformed judge response: {0}")]
    Malformed(String),
}

impl InvokeError {
    pub fn provider(
        provider: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            retryable,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Whether the invoker's own transport layer could retry this. The
    /// engine never retries; this is advisory for the invoker side.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } => *retryable,
            Self::Timeout(_) => true,
            Self::Malformed(_) => false,
        }
    }
}

/// One judge call. Implementations must be safe for concurrent invocation
/// across different models; retries, if any, happen inside.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, model: &str, task: &EvaluationTask)
        -> Result<JudgeOutcome, InvokeError>;
}
