//! Offline evaluation harness for the multi-model executor.
//!
//! Runs synthetic cases through the actual engine, replacing judge calls
//! with a deterministic seeded simulator. No network, reproducible by seed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::aggregate::AggregationStrategy;
use crate::audit::NoopSink;
use crate::config::{AdmissionStrategy, EngineConfig, RateLimitSettings};
use crate::execute::{EvalEngine, EvalError, EvaluationTask, FailureKind, ModelResult};
use crate::invoker::{InvokeError, JudgeOutcome, ModelInvoker};

// =============================================================================
// Synthetic case definitions
// =============================================================================

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    pub name: &'static str,
    pub rps: Option<u32>,
    pub strategy: AdmissionStrategy,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SyntheticCase {
    pub name: &'static str,
    pub providers: Vec<SyntheticProvider>,
    /// (model, provider) pairs fanned out per evaluation.
    pub models: Vec<(&'static str, &'static str)>,
    pub aggregation: AggregationStrategy,
    pub evaluations: usize,
    /// Mean score the simulated judges produce, per model.
    pub score_means: HashMap<&'static str, f64>,
    pub score_jitter: f64,
    pub failure_rate: f64,
    pub call_latency: Duration,
    pub seed: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CaseReport {
    pub case_name: String,
    pub evaluations: usize,
    pub scored_calls: usize,
    pub rate_limited_calls: usize,
    pub failed_calls: usize,
    pub evaluations_with_score: usize,
    pub mean_score: Option<f64>,
}

// =============================================================================
// Simulated judge
// =============================================================================

/// A deterministic stand-in for the judge boundary: per-model score means,
/// seeded jitter, and an injected failure rate.
pub struct SimulatedJudge {
    rng: Mutex<StdRng>,
    score_means: HashMap<&'static str, f64>,
    score_jitter: f64,
    failure_rate: f64,
    call_latency: Duration,
}

impl SimulatedJudge {
    pub fn new(case: &SyntheticCase) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(case.seed)),
            score_means: case.score_means.clone(),
            score_jitter: case.score_jitter,
            failure_rate: case.failure_rate,
            call_latency: case.call_latency,
        }
    }
}

#[async_trait]
impl ModelInvoker for SimulatedJudge {
    async fn invoke(
        &self,
        model: &str,
        _task: &EvaluationTask,
    ) -> Result<JudgeOutcome, InvokeError> {
        if !self.call_latency.is_zero() {
            tokio::time::sleep(self.call_latency).await;
        }

        let (fail_draw, jitter) = {
            let mut rng = self.rng.lock().unwrap();
            (
                rng.gen::<f64>(),
                rng.gen_range(-self.score_jitter..=self.score_jitter),
            )
        };

        if fail_draw < self.failure_rate {
            return Err(InvokeError::provider("synthetic", "injected failure", true));
        }

        let mean = self.score_means.get(model).copied().unwrap_or(0.5);
        Ok(JudgeOutcome::new((mean + jitter).clamp(0.0, 1.0)))
    }
}

// =============================================================================
// Public API
// =============================================================================

pub fn synthetic_cases() -> Vec<SyntheticCase> {
    vec![
        SyntheticCase {
            name: "clean_panel_3",
            providers: vec![SyntheticProvider {
                name: "alpha",
                rps: None,
                strategy: AdmissionStrategy::Wait,
                timeout_ms: 0,
            }],
            models: vec![
                ("judge-a", "alpha"),
                ("judge-b", "alpha"),
                ("judge-c", "alpha"),
            ],
            aggregation: AggregationStrategy::Average,
            evaluations: 8,
            score_means: HashMap::from([("judge-a", 0.8), ("judge-b", 0.7), ("judge-c", 0.9)]),
            score_jitter: 0.05,
            failure_rate: 0.0,
            call_latency: Duration::ZERO,
            seed: 42,
        },
        SyntheticCase {
            name: "flaky_judges_median",
            providers: vec![SyntheticProvider {
                name: "alpha",
                rps: None,
                strategy: AdmissionStrategy::Wait,
                timeout_ms: 0,
            }],
            models: vec![
                ("judge-a", "alpha"),
                ("judge-b", "alpha"),
                ("judge-c", "alpha"),
            ],
            aggregation: AggregationStrategy::Median,
            evaluations: 12,
            score_means: HashMap::from([("judge-a", 0.6), ("judge-b", 0.6), ("judge-c", 0.6)]),
            score_jitter: 0.1,
            failure_rate: 0.25,
            call_latency: Duration::ZERO,
            seed: 43,
        },
        SyntheticCase {
            name: "rate_limit_pressure_reject",
            providers: vec![SyntheticProvider {
                name: "alpha",
                rps: Some(2),
                strategy: AdmissionStrategy::Reject,
                timeout_ms: 0,
            }],
            models: vec![
                ("judge-a", "alpha"),
                ("judge-b", "alpha"),
                ("judge-c", "alpha"),
                ("judge-d", "alpha"),
                ("judge-e", "alpha"),
            ],
            aggregation: AggregationStrategy::Average,
            evaluations: 1,
            score_means: HashMap::from([
                ("judge-a", 0.7),
                ("judge-b", 0.7),
                ("judge-c", 0.7),
                ("judge-d", 0.7),
                ("judge-e", 0.7),
            ]),
            score_jitter: 0.0,
            failure_rate: 0.0,
            call_latency: Duration::ZERO,
            seed: 44,
        },
        SyntheticCase {
            name: "two_providers_mixed",
            providers: vec![
                SyntheticProvider {
                    name: "alpha",
                    rps: Some(10),
                    strategy: AdmissionStrategy::Wait,
                    timeout_ms: 0,
                },
                SyntheticProvider {
                    name: "beta",
                    rps: None,
                    strategy: AdmissionStrategy::Wait,
                    timeout_ms: 0,
                },
            ],
            models: vec![
                ("judge-a", "alpha"),
                ("judge-b", "alpha"),
                ("judge-c", "beta"),
            ],
            aggregation: AggregationStrategy::MajorityVoting,
            evaluations: 6,
            score_means: HashMap::from([("judge-a", 0.9), ("judge-b", 0.8), ("judge-c", 0.2)]),
            score_jitter: 0.05,
            failure_rate: 0.1,
            call_latency: Duration::from_millis(5),
            seed: 45,
        },
    ]
}

pub async fn run_synthetic_suite() -> Result<Vec<CaseReport>, EvalError> {
    let mut reports = Vec::new();
    for case in synthetic_cases() {
        reports.push(run_synthetic_case(&case).await?);
    }
    Ok(reports)
}

pub async fn run_synthetic_case(case: &SyntheticCase) -> Result<CaseReport, EvalError> {
    let mut config = EngineConfig::new();
    for provider in &case.providers {
        let mut settings = RateLimitSettings::default().strategy(provider.strategy);
        settings.rps = provider.rps;
        settings = settings.timeout_ms(provider.timeout_ms);
        config = config.with_provider(provider.name, settings);
    }
    for (model, provider) in &case.models {
        config = config.with_model(*model, *provider);
    }

    let engine = EvalEngine::from_config(
        &config,
        Arc::new(SimulatedJudge::new(case)),
        Arc::new(NoopSink),
        case.aggregation,
    );

    let models: Vec<String> = case.models.iter().map(|(m, _)| m.to_string()).collect();
    let task = Arc::new(EvaluationTask::new(
        "synthetic",
        serde_json::json!({ "case": case.name }),
    ));

    let mut scored_calls = 0usize;
    let mut rate_limited_calls = 0usize;
    let mut failed_calls = 0usize;
    let mut evaluations_with_score = 0usize;
    let mut score_sum = 0.0f64;

    for _ in 0..case.evaluations {
        let result = engine.evaluate(task.clone(), &models, None).await?;
        for model_result in result.model_results.values() {
            match model_result {
                ModelResult::Success { .. } => scored_calls += 1,
                ModelResult::Failure {
                    reason: FailureKind::RateLimited,
                    ..
                } => rate_limited_calls += 1,
                ModelResult::Failure { .. } => failed_calls += 1,
            }
        }
        if let Some(score) = result.score {
            evaluations_with_score += 1;
            score_sum += score;
        }
    }

    let mean_score = (evaluations_with_score > 0)
        .then(|| score_sum / evaluations_with_score as f64);

    Ok(CaseReport {
        case_name: case.name.to_string(),
        evaluations: case.evaluations,
        scored_calls,
        rate_limited_calls,
        failed_calls,
        evaluations_with_score,
        mean_score,
    })
}
