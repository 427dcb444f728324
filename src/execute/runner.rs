//! Single-model execution: resolve, admit, invoke, convert to data.
//!
//! Implements the contract that one model's evaluation always completes with
//! a `ModelResult`: admission denials, configuration gaps, and invoker
//! errors all become per-model failure data, never errors that could abort a
//! sibling model.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::invoker::ModelInvoker;
use crate::provider::ProviderRegistry;

use super::types::{EvaluationTask, FailureKind, ModelResult};

/// Everything the executor needs back from one run: the result itself plus
/// the audit detail that does not belong in it.
#[derive(Debug)]
pub(crate) struct RunOutcome {
    pub result: ModelResult,
    pub provider: Option<String>,
    pub admission_wait: Duration,
}

impl RunOutcome {
    fn failed(reason: FailureKind) -> Self {
        Self {
            result: ModelResult::Failure {
                reason,
                duration: Duration::ZERO,
            },
            provider: None,
            admission_wait: Duration::ZERO,
        }
    }
}

fn cancelled(flag: Option<&AtomicBool>) -> bool {
    flag.is_some_and(|flag| flag.load(AtomicOrdering::Relaxed))
}

pub(crate) async fn run_model(
    registry: &ProviderRegistry,
    invoker: &dyn ModelInvoker,
    model: &str,
    task: &EvaluationTask,
    cancel_flag: Option<&AtomicBool>,
) -> RunOutcome {
    let Ok((provider, controller)) = registry.resolve_controller(model) else {
        warn!(model, "No provider mapping for model");
        return RunOutcome::failed(FailureKind::UnknownProvider);
    };
    let provider = provider.to_string();

    if cancelled(cancel_flag) {
        return RunOutcome {
            provider: Some(provider),
            ..RunOutcome::failed(FailureKind::Cancelled)
        };
    }

    let permit = match controller.acquire().await {
        Ok(permit) => permit,
        Err(err) => {
            debug!(model, provider = %provider, error = %err, "Admission denied");
            return RunOutcome {
                provider: Some(provider),
                ..RunOutcome::failed(FailureKind::RateLimited)
            };
        }
    };

    if cancelled(cancel_flag) {
        return RunOutcome {
            provider: Some(provider),
            admission_wait: permit.waited,
            ..RunOutcome::failed(FailureKind::Cancelled)
        };
    }

    let started = Instant::now();
    let result = match invoker.invoke(model, task).await {
        Ok(outcome) if !outcome.score.is_finite() => {
            let duration = started.elapsed();
            warn!(model, score = outcome.score, "Judge returned a non-finite score");
            ModelResult::Failure {
                reason: FailureKind::Invocation("non-finite score".to_string()),
                duration,
            }
        }
        Ok(outcome) => ModelResult::Success {
            score: outcome.score,
            explanation: outcome.explanation,
            duration: started.elapsed(),
        },
        Err(err) => {
            let duration = started.elapsed();
            warn!(model, provider = %provider, error = %err, "Judge invocation failed");
            ModelResult::Failure {
                reason: FailureKind::Invocation(err.to_string()),
                duration,
            }
        }
    };

    RunOutcome {
        result,
        provider: Some(provider),
        admission_wait: permit.waited,
    }
}
