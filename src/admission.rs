//! Per-provider admission control.
//!
//! Each provider owns one token bucket sized to its configured
//! requests-per-second budget. Every model hosted by that provider contends
//! for the same bucket; models on different providers never interact.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::{AdmissionStrategy, ResolvedLimit};

/// Proof that admission was granted for one outbound call.
///
/// Carries the time spent waiting on the bucket so callers can report
/// admission wait separately from call latency. Holds no lock.
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    pub waited: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("rate limit exceeded for provider {provider}")]
    RateLimitExceeded { provider: String },
}

/// Internal token bucket state. Guarded by the controller's mutex; the lock
/// is held only for the check-and-decrement, never across a sleep.
#[derive(Debug)]
struct BucketState {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl BucketState {
    fn new(rps: u32) -> Self {
        let capacity = rps as f64;
        Self {
            tokens: capacity,
            capacity,
            refill_rate: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refill from elapsed time, then try to take one token.
    /// Returns `None` on success or the wait until the next token.
    fn try_take(&mut self) -> Option<Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - self.tokens;
            let wait_secs = if self.refill_rate > 0.0 {
                deficit / self.refill_rate
            } else {
                f64::MAX
            };
            Some(Duration::try_from_secs_f64(wait_secs).unwrap_or(Duration::MAX))
        }
    }
}

/// Token-bucket gate for one provider.
///
/// A provider without a configured budget gets an unthrottled controller:
/// every acquisition succeeds immediately.
#[derive(Debug)]
pub struct AdmissionController {
    provider: String,
    bucket: Option<Mutex<BucketState>>,
    strategy: AdmissionStrategy,
    timeout: Duration,
}

impl AdmissionController {
    pub fn new(provider: impl Into<String>, limit: ResolvedLimit) -> Self {
        Self {
            provider: provider.into(),
            bucket: limit.rps.map(|rps| Mutex::new(BucketState::new(rps))),
            strategy: limit.strategy,
            timeout: limit.timeout,
        }
    }

    pub fn unthrottled(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            bucket: None,
            strategy: AdmissionStrategy::default(),
            timeout: Duration::ZERO,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Acquire one admission token using the configured strategy.
    ///
    /// REJECT fails immediately when no token is available. WAIT suspends
    /// until a token arrives or the configured timeout elapses; a zero
    /// timeout waits indefinitely. The failure is never reported before the
    /// timeout has fully elapsed.
    pub async fn acquire(&self) -> Result<Permit, AdmissionError> {
        let Some(bucket) = &self.bucket else {
            return Ok(Permit {
                waited: Duration::ZERO,
            });
        };

        let start = Instant::now();
        match self.strategy {
            AdmissionStrategy::Reject => match bucket.lock().unwrap().try_take() {
                None => Ok(Permit {
                    waited: start.elapsed(),
                }),
                Some(_) => Err(self.exceeded()),
            },
            AdmissionStrategy::Wait => {
                let deadline = (!self.timeout.is_zero()).then(|| start + self.timeout);
                loop {
                    let wait = bucket.lock().unwrap().try_take();
                    let Some(wait) = wait else {
                        return Ok(Permit {
                            waited: start.elapsed(),
                        });
                    };

                    let past_deadline = deadline.is_some_and(|deadline| {
                        Instant::now()
                            .checked_add(wait)
                            .map_or(true, |ready| ready >= deadline)
                    });
                    match deadline {
                        Some(deadline) if past_deadline => {
                            let remaining = deadline.saturating_duration_since(Instant::now());
                            if !remaining.is_zero() {
                                tokio::time::sleep(remaining).await;
                            }
                            if bucket.lock().unwrap().try_take().is_none() {
                                return Ok(Permit {
                                    waited: start.elapsed(),
                                });
                            }
                            return Err(self.exceeded());
                        }
                        _ => tokio::time::sleep(wait).await,
                    }
                }
            }
        }
    }

    /// Non-blocking acquisition regardless of the configured strategy.
    pub fn try_acquire(&self) -> Result<Permit, AdmissionError> {
        let Some(bucket) = &self.bucket else {
            return Ok(Permit {
                waited: Duration::ZERO,
            });
        };
        match bucket.lock().unwrap().try_take() {
            None => Ok(Permit {
                waited: Duration::ZERO,
            }),
            Some(_) => Err(self.exceeded()),
        }
    }

    fn exceeded(&self) -> AdmissionError {
        AdmissionError::RateLimitExceeded {
            provider: self.provider.clone(),
        }
    }
}
