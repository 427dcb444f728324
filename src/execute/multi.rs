//! Multi-model fan-out executor.
//!
//! Wires together:
//! - ProviderRegistry (model → provider, per-provider admission)
//! - ModelInvoker (the opaque judge boundary)
//! - aggregate() (pure score reduction)
//!
//! Core flow:
//! 1. Schedule one task runner per model, all concurrent.
//! 2. Wait for every runner; no short-circuit on first failure or success.
//! 3. Partition into scored and excluded, audit each call via the EvalSink.
//! 4. Aggregate the surviving scores, or mark the score undefined.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::warn;
use uuid::Uuid;

use crate::aggregate::{aggregate, AggregationError, AggregationStrategy};
use crate::audit::{EvalSink, ModelCallRecord};
use crate::config::EngineConfig;
use crate::invoker::ModelInvoker;
use crate::provider::ProviderRegistry;

use super::options::EvaluateRunOptions;
use super::runner::{run_model, RunOutcome};
use super::types::{EvaluationResult, EvaluationTask, ModelResult, ScoreUndefinedReason};

/// Errors raised before any fan-out begins. Once models are scheduled, all
/// failures become per-model data instead.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("model set must not be empty")]
    EmptyModelSet,
    #[error("duplicate model in evaluation set: {0}")]
    DuplicateModel(String),
    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// The evaluation engine: fans one task out to a set of judge models and
/// folds the surviving scores into a single verdict.
///
/// Construct once and share (`Arc`) across callers; all state beyond the
/// provider buckets is immutable.
pub struct EvalEngine<S: EvalSink> {
    registry: Arc<ProviderRegistry>,
    invoker: Arc<dyn ModelInvoker>,
    sink: Arc<S>,
    aggregation: AggregationStrategy,
}

impl<S: EvalSink> EvalEngine<S> {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        invoker: Arc<dyn ModelInvoker>,
        sink: Arc<S>,
        aggregation: AggregationStrategy,
    ) -> Self {
        Self {
            registry,
            invoker,
            sink,
            aggregation,
        }
    }

    /// Build the registry from configuration and wire the engine in one step.
    pub fn from_config(
        config: &EngineConfig,
        invoker: Arc<dyn ModelInvoker>,
        sink: Arc<S>,
        aggregation: AggregationStrategy,
    ) -> Self {
        Self::new(
            Arc::new(ProviderRegistry::new(config)),
            invoker,
            sink,
            aggregation,
        )
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Evaluate one task across a set of models.
    ///
    /// The returned future is cancellable: dropping it stops all waiting,
    /// and setting `cancel_flag` turns not-yet-started model runs into
    /// `Cancelled` failures (in-flight invocations are not forcibly
    /// stopped). An overall wall-clock bound, if wanted, belongs to the
    /// caller, e.g. `tokio::time::timeout(limit, engine.evaluate(..))`.
    pub async fn evaluate(
        &self,
        task: Arc<EvaluationTask>,
        models: &[String],
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<EvaluationResult, EvalError> {
        self.evaluate_with_options(task, models, &EvaluateRunOptions::default(), cancel_flag)
            .await
    }

    pub async fn evaluate_with_options(
        &self,
        task: Arc<EvaluationTask>,
        models: &[String],
        options: &EvaluateRunOptions,
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<EvaluationResult, EvalError> {
        if models.is_empty() {
            return Err(EvalError::EmptyModelSet);
        }
        let mut seen = std::collections::HashSet::new();
        for model in models {
            if !seen.insert(model.as_str()) {
                return Err(EvalError::DuplicateModel(model.clone()));
            }
        }

        let evaluation_id = Uuid::new_v4();
        let started = Instant::now();

        // Every model runs concurrently; backpressure is the admission
        // controllers' job, not the executor's.
        let outcomes: Vec<(String, RunOutcome)> = stream::iter(models.iter().cloned().map(|model| {
            let task = task.clone();
            async move {
                let outcome = run_model(
                    &self.registry,
                    self.invoker.as_ref(),
                    &model,
                    &task,
                    cancel_flag,
                )
                .await;
                (model.clone(), outcome)
            }
        }))
        .buffer_unordered(models.len())
        .collect()
        .await;

        let mut model_results: BTreeMap<String, ModelResult> = BTreeMap::new();
        let mut excluded_models: Vec<String> = Vec::new();
        let mut scores: Vec<f64> = Vec::new();

        for (model, outcome) in outcomes {
            self.sink
                .record(call_record(evaluation_id, &model, &task.metric, &outcome))
                .await;

            match &outcome.result {
                ModelResult::Success { score, .. } => scores.push(*score),
                ModelResult::Failure { .. } => excluded_models.push(model.clone()),
            }
            model_results.insert(model, outcome.result);
        }
        excluded_models.sort();

        let strategy = options.strategy.unwrap_or(self.aggregation);
        let (score, score_undefined) = if scores.is_empty() {
            (None, Some(ScoreUndefinedReason::NoModelSucceeded))
        } else {
            match aggregate(strategy, &scores) {
                Ok(value) => (Some(value), None),
                Err(AggregationError::ConsensusDisagreement) => {
                    warn!(
                        evaluation_id = %evaluation_id,
                        scores = scores.len(),
                        "Consensus aggregation found disagreeing judges"
                    );
                    (None, Some(ScoreUndefinedReason::ConsensusDisagreement))
                }
                Err(AggregationError::Empty) => {
                    (None, Some(ScoreUndefinedReason::NoModelSucceeded))
                }
            }
        };

        Ok(EvaluationResult {
            score,
            model_results,
            excluded_models,
            duration: started.elapsed(),
            score_undefined,
        })
    }

    /// Synchronous convenience wrapper. Spins up a current-thread runtime;
    /// must not be called from inside an async context.
    pub fn evaluate_blocking(
        &self,
        task: Arc<EvaluationTask>,
        models: &[String],
    ) -> Result<EvaluationResult, EvalError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.evaluate(task, models, None))
    }
}

fn call_record(
    evaluation_id: Uuid,
    model: &str,
    metric: &str,
    outcome: &RunOutcome,
) -> ModelCallRecord {
    let mut record = ModelCallRecord::new(evaluation_id, model, metric)
        .latency(outcome.result.duration().as_millis() as i64)
        .admission_wait(outcome.admission_wait.as_millis() as i64);
    if let Some(provider) = &outcome.provider {
        record = record.provider(provider.clone());
    }
    record = match &outcome.result {
        ModelResult::Success { score, .. } => record.score(*score),
        ModelResult::Failure { reason, .. } => record.error(reason.code()),
    };
    record
}
