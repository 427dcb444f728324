#![forbid(unsafe_code)]

//! # jury-harness
//!
//! Score AI-generated text with a panel of judge models.
//!
//! One evaluation task fans out concurrently to every configured judge.
//! Each upstream provider is gated by its own token-bucket admission
//! controller (WAIT or REJECT), a failing judge never aborts its siblings,
//! and the surviving scores fold into a single verdict through a selectable
//! aggregation strategy (average, median, majority vote, min, max, or
//! consensus). The result carries auditable per-model detail either way:
//! callers always learn what scored, what failed, and why.
//!
//! Prompt construction, response parsing, and transport live behind the
//! injected [`ModelInvoker`]; this crate owns only the execution engine.

pub mod admission;
pub mod aggregate;
pub mod audit;
pub mod config;
pub mod execute;
pub mod invoker;
pub mod provider;
pub mod simulate;

pub use admission::{AdmissionController, AdmissionError, Permit};
pub use aggregate::{aggregate, AggregationError, AggregationStrategy};
pub use audit::{CallStatus, EvalSink, ModelCallRecord, NoopSink, StderrSink};
pub use config::{AdmissionStrategy, EngineConfig, RateLimitSettings, ResolvedLimit};
pub use execute::{
    EvalEngine, EvalError, EvaluateRunOptions, EvaluationResult, EvaluationTask, FailureKind,
    ModelResult, ScoreUndefinedReason,
};
pub use invoker::{InvokeError, JudgeOutcome, ModelInvoker};
pub use provider::{ProviderRegistry, RegistryError};
