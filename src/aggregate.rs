//! Score aggregation strategies.
//!
//! Pure and synchronous: a non-empty slice of per-model scores in, one
//! scalar out. The executor only calls this once at least one model has
//! succeeded, so scores are always finite.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Two scores within this distance count as identical for CONSENSUS.
pub const CONSENSUS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationStrategy {
    /// Arithmetic mean of all scores.
    #[default]
    Average,
    /// Middle value after sorting; mean of the two middles for even counts.
    Median,
    /// Each score >= 0.5 is a yes-vote; 1.0 iff strictly more than half vote
    /// yes, else 0.0. An even split is not a majority.
    MajorityVoting,
    /// The strictest judge wins.
    Min,
    /// The most lenient judge wins.
    Max,
    /// All scores identical → that value. All on the same side of 0.5 →
    /// their mean. Anything else fails the aggregation.
    Consensus,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no scores to aggregate")]
    Empty,
    #[error("consensus strategy found disagreeing scores")]
    ConsensusDisagreement,
}

pub fn aggregate(
    strategy: AggregationStrategy,
    scores: &[f64],
) -> Result<f64, AggregationError> {
    if scores.is_empty() {
        return Err(AggregationError::Empty);
    }
    let value = match strategy {
        AggregationStrategy::Average => mean(scores),
        AggregationStrategy::Median => median(scores),
        AggregationStrategy::MajorityVoting => {
            let yes = scores.iter().filter(|s| **s >= 0.5).count();
            if yes * 2 > scores.len() {
                1.0
            } else {
                0.0
            }
        }
        AggregationStrategy::Min => scores.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationStrategy::Max => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationStrategy::Consensus => return consensus(scores),
    };
    Ok(value)
}

fn mean(scores: &[f64]) -> f64 {
    scores.iter().sum::<f64>() / scores.len() as f64
}

fn median(scores: &[f64]) -> f64 {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("scores are finite"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

fn consensus(scores: &[f64]) -> Result<f64, AggregationError> {
    let first = scores[0];
    if scores
        .iter()
        .all(|s| (s - first).abs() <= CONSENSUS_EPSILON)
    {
        return Ok(first);
    }
    let first_vote = first >= 0.5;
    if scores.iter().all(|s| (*s >= 0.5) == first_vote) {
        return Ok(mean(scores));
    }
    Err(AggregationError::ConsensusDisagreement)
}
