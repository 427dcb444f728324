use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use jury_harness::{
    AdmissionStrategy, AggregationStrategy, EngineConfig, EvalEngine, EvaluationTask, InvokeError,
    JudgeOutcome, ModelInvoker, NoopSink, RateLimitSettings,
};

struct SleepyJudge {
    latency: Duration,
}

#[async_trait]
impl ModelInvoker for SleepyJudge {
    async fn invoke(
        &self,
        _model: &str,
        _task: &EvaluationTask,
    ) -> Result<JudgeOutcome, InvokeError> {
        tokio::time::sleep(self.latency).await;
        Ok(JudgeOutcome::new(0.9))
    }
}

/// Three judges contend for a two-token bucket under unbounded WAIT. The
/// third waits roughly half a second for admission, then spends 200ms in the
/// call; its reported duration must cover only the call.
#[tokio::test]
async fn model_duration_excludes_admission_wait() {
    let mut config = EngineConfig::new().with_provider(
        "openai",
        RateLimitSettings::rps(2).strategy(AdmissionStrategy::Wait),
    );
    for model in ["judge-0", "judge-1", "judge-2"] {
        config = config.with_model(model, "openai");
    }

    let engine = EvalEngine::from_config(
        &config,
        Arc::new(SleepyJudge {
            latency: Duration::from_millis(200),
        }),
        Arc::new(NoopSink),
        AggregationStrategy::Average,
    );

    let models: Vec<String> = ["judge-0", "judge-1", "judge-2"]
        .iter()
        .map(|m| m.to_string())
        .collect();
    let task = Arc::new(EvaluationTask::new("faithfulness", serde_json::json!({})));

    let result = engine.evaluate(task, &models, None).await.unwrap();

    assert_eq!(result.scored_models().len(), 3);

    // Every per-model duration is close to the call latency, gated or not.
    for model_result in result.model_results.values() {
        let duration = model_result.duration();
        assert!(duration >= Duration::from_millis(200), "short: {duration:?}");
        assert!(duration < Duration::from_millis(400), "long: {duration:?}");
    }

    // The fan-out as a whole did absorb the admission wait.
    assert!(result.duration >= Duration::from_millis(600));
    assert!(result.duration < Duration::from_secs(2));
}

/// Ungated fan-out completes in roughly one call time, not the sum.
#[tokio::test]
async fn fan_out_runs_judges_in_parallel() {
    let mut config = EngineConfig::new();
    for i in 0..6 {
        config = config.with_model(format!("judge-{i}"), "openai");
    }

    let engine = EvalEngine::from_config(
        &config,
        Arc::new(SleepyJudge {
            latency: Duration::from_millis(150),
        }),
        Arc::new(NoopSink),
        AggregationStrategy::Average,
    );

    let models: Vec<String> = (0..6).map(|i| format!("judge-{i}")).collect();
    let task = Arc::new(EvaluationTask::new("faithfulness", serde_json::json!({})));

    let result = engine.evaluate(task, &models, None).await.unwrap();

    assert_eq!(result.scored_models().len(), 6);
    assert!(result.duration >= Duration::from_millis(150));
    assert!(
        result.duration < Duration::from_millis(600),
        "fan-out serialized: {:?}",
        result.duration
    );
}
