use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use jury_harness::{
    AdmissionStrategy, AggregationStrategy, EngineConfig, EvalEngine, EvalError, EvaluationTask,
    FailureKind, InvokeError, JudgeOutcome, ModelInvoker, ModelResult, NoopSink,
    RateLimitSettings, ScoreUndefinedReason,
};

struct FixedJudge {
    score: f64,
    calls: AtomicUsize,
}

impl FixedJudge {
    fn new(score: f64) -> Self {
        Self {
            score,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelInvoker for FixedJudge {
    async fn invoke(
        &self,
        _model: &str,
        _task: &EvaluationTask,
    ) -> Result<JudgeOutcome, InvokeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(JudgeOutcome::explained(self.score, "fixed"))
    }
}

struct AlwaysFailingJudge;

#[async_trait]
impl ModelInvoker for AlwaysFailingJudge {
    async fn invoke(
        &self,
        _model: &str,
        _task: &EvaluationTask,
    ) -> Result<JudgeOutcome, InvokeError> {
        Err(InvokeError::provider("upstream", "503 from provider", true))
    }
}

fn task() -> Arc<EvaluationTask> {
    Arc::new(EvaluationTask::new(
        "faithfulness",
        serde_json::json!({"question": "q", "answer": "a"}),
    ))
}

fn model_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("judge-{i}")).collect()
}

#[tokio::test]
async fn reject_pressure_scores_the_burst_and_excludes_the_rest() {
    let mut config = EngineConfig::new().with_provider(
        "openai",
        RateLimitSettings::rps(2).strategy(AdmissionStrategy::Reject),
    );
    for model in model_names(5) {
        config = config.with_model(model, "openai");
    }

    let judge = Arc::new(FixedJudge::new(0.8));
    let engine = EvalEngine::from_config(
        &config,
        judge.clone(),
        Arc::new(NoopSink),
        AggregationStrategy::Average,
    );

    let models = model_names(5);
    let result = engine.evaluate(task(), &models, None).await.unwrap();

    assert_eq!(result.scored_models().len(), 2);
    assert_eq!(result.excluded_models.len(), 3);
    assert_eq!(result.model_results.len(), 5);
    assert_eq!(judge.calls.load(Ordering::Relaxed), 2);

    for excluded in &result.excluded_models {
        assert!(matches!(
            result.model_results[excluded],
            ModelResult::Failure {
                reason: FailureKind::RateLimited,
                ..
            }
        ));
    }

    // Aggregated only over the two admitted judges.
    assert_eq!(result.score, Some(0.8));
    assert!(result.score_undefined.is_none());
}

#[tokio::test]
async fn all_failures_yield_no_score_but_full_detail() {
    let mut config = EngineConfig::new();
    for model in model_names(3) {
        config = config.with_model(model, "openai");
    }

    let engine = EvalEngine::from_config(
        &config,
        Arc::new(AlwaysFailingJudge),
        Arc::new(NoopSink),
        AggregationStrategy::Average,
    );

    let models = model_names(3);
    let result = engine.evaluate(task(), &models, None).await.unwrap();

    assert_eq!(result.score, None);
    assert_eq!(
        result.score_undefined,
        Some(ScoreUndefinedReason::NoModelSucceeded)
    );
    let mut excluded = result.excluded_models.clone();
    excluded.sort();
    let mut all = models.clone();
    all.sort();
    assert_eq!(excluded, all);

    for result in result.model_results.values() {
        match result {
            ModelResult::Failure {
                reason: FailureKind::Invocation(message),
                ..
            } => assert!(message.contains("503")),
            other => panic!("expected invocation failure, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn unmapped_model_fails_alone() {
    let config = EngineConfig::new()
        .with_model("judge-0", "openai")
        .with_model("judge-1", "openai");

    let engine = EvalEngine::from_config(
        &config,
        Arc::new(FixedJudge::new(0.6)),
        Arc::new(NoopSink),
        AggregationStrategy::Average,
    );

    let models = vec![
        "judge-0".to_string(),
        "judge-1".to_string(),
        "ghost-judge".to_string(),
    ];
    let result = engine.evaluate(task(), &models, None).await.unwrap();

    assert_eq!(result.excluded_models, vec!["ghost-judge".to_string()]);
    assert!(matches!(
        result.model_results["ghost-judge"],
        ModelResult::Failure {
            reason: FailureKind::UnknownProvider,
            ..
        }
    ));
    assert_eq!(result.scored_models(), vec!["judge-0", "judge-1"]);
    assert_eq!(result.score, Some(0.6));
}

#[tokio::test]
async fn empty_model_set_is_the_only_hard_error() {
    let engine = EvalEngine::from_config(
        &EngineConfig::new(),
        Arc::new(FixedJudge::new(0.5)),
        Arc::new(NoopSink),
        AggregationStrategy::Average,
    );

    let err = engine.evaluate(task(), &[], None).await.unwrap_err();
    assert!(matches!(err, EvalError::EmptyModelSet));
}

#[tokio::test]
async fn duplicate_models_are_rejected_before_fan_out() {
    let config = EngineConfig::new().with_model("judge-0", "openai");
    let judge = Arc::new(FixedJudge::new(0.5));
    let engine = EvalEngine::from_config(
        &config,
        judge.clone(),
        Arc::new(NoopSink),
        AggregationStrategy::Average,
    );

    let models = vec!["judge-0".to_string(), "judge-0".to_string()];
    let err = engine.evaluate(task(), &models, None).await.unwrap_err();
    assert!(matches!(err, EvalError::DuplicateModel(model) if model == "judge-0"));
    assert_eq!(judge.calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn consensus_disagreement_is_reported_not_thrown() {
    struct SplitJudge;

    #[async_trait]
    impl ModelInvoker for SplitJudge {
        async fn invoke(
            &self,
            model: &str,
            _task: &EvaluationTask,
        ) -> Result<JudgeOutcome, InvokeError> {
            let score = if model.ends_with('0') { 0.9 } else { 0.1 };
            Ok(JudgeOutcome::new(score))
        }
    }

    let config = EngineConfig::new()
        .with_model("judge-0", "openai")
        .with_model("judge-1", "openai");

    let engine = EvalEngine::from_config(
        &config,
        Arc::new(SplitJudge),
        Arc::new(NoopSink),
        AggregationStrategy::Consensus,
    );

    let models = vec!["judge-0".to_string(), "judge-1".to_string()];
    let result = engine.evaluate(task(), &models, None).await.unwrap();

    assert_eq!(result.score, None);
    assert_eq!(
        result.score_undefined,
        Some(ScoreUndefinedReason::ConsensusDisagreement)
    );
    // Both judges still answered; nothing was excluded.
    assert!(result.excluded_models.is_empty());
    assert_eq!(result.scored_models().len(), 2);
}

#[tokio::test]
async fn per_call_strategy_override_wins() {
    let config = EngineConfig::new()
        .with_model("judge-0", "openai")
        .with_model("judge-1", "openai");

    struct PairJudge;

    #[async_trait]
    impl ModelInvoker for PairJudge {
        async fn invoke(
            &self,
            model: &str,
            _task: &EvaluationTask,
        ) -> Result<JudgeOutcome, InvokeError> {
            let score = if model.ends_with('0') { 1.0 } else { 0.0 };
            Ok(JudgeOutcome::new(score))
        }
    }

    let engine = EvalEngine::from_config(
        &config,
        Arc::new(PairJudge),
        Arc::new(NoopSink),
        AggregationStrategy::Average,
    );

    let models = vec!["judge-0".to_string(), "judge-1".to_string()];
    let options = jury_harness::EvaluateRunOptions {
        strategy: Some(AggregationStrategy::Min),
    };
    let result = engine
        .evaluate_with_options(task(), &models, &options, None)
        .await
        .unwrap();
    assert_eq!(result.score, Some(0.0));
}

#[tokio::test]
async fn blocking_wrapper_matches_async_result() {
    let config = EngineConfig::new().with_model("judge-0", "openai");
    let engine = EvalEngine::from_config(
        &config,
        Arc::new(FixedJudge::new(0.75)),
        Arc::new(NoopSink),
        AggregationStrategy::Average,
    );

    let models = vec!["judge-0".to_string()];
    let result = tokio::task::spawn_blocking(move || engine.evaluate_blocking(task(), &models))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.score, Some(0.75));
}
