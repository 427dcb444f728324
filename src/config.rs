//! Engine configuration: per-provider admission budgets and the
//! model → provider mapping.
//!
//! Settings deserialize from JSON (or any serde format). A `defaults` block
//! applies to every provider; a provider's own block overrides it field by
//! field.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// What to do when a provider's bucket has no token available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdmissionStrategy {
    /// Suspend until a token arrives or the timeout elapses.
    #[default]
    Wait,
    /// Fail immediately; the timeout is ignored.
    Reject,
}

/// Raw per-provider settings as they appear in configuration.
///
/// All fields optional so that a provider block only needs to name what it
/// overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitSettings {
    /// Sustained requests per second. Unset disables throttling entirely.
    pub rps: Option<u32>,
    pub strategy: Option<AdmissionStrategy>,
    /// How long a WAIT acquisition may block, in milliseconds. 0 waits
    /// indefinitely. Meaningless under REJECT.
    pub timeout_ms: Option<u64>,
}

impl RateLimitSettings {
    pub fn rps(rps: u32) -> Self {
        Self {
            rps: Some(rps),
            ..Self::default()
        }
    }

    pub fn strategy(mut self, strategy: AdmissionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Resolve against a defaults block: each unset field falls back.
    pub fn merged_over(&self, defaults: &RateLimitSettings) -> ResolvedLimit {
        ResolvedLimit {
            rps: self.rps.or(defaults.rps),
            strategy: self
                .strategy
                .or(defaults.strategy)
                .unwrap_or_default(),
            timeout: Duration::from_millis(
                self.timeout_ms.or(defaults.timeout_ms).unwrap_or(0),
            ),
        }
    }
}

/// Fully-resolved admission policy for one provider.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedLimit {
    pub rps: Option<u32>,
    pub strategy: AdmissionStrategy,
    pub timeout: Duration,
}

impl Default for ResolvedLimit {
    fn default() -> Self {
        RateLimitSettings::default().merged_over(&RateLimitSettings::default())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Fallback admission settings for providers without their own block.
    #[serde(default)]
    pub defaults: RateLimitSettings,
    /// Per-provider admission settings, keyed by provider name.
    #[serde(default)]
    pub providers: HashMap<String, RateLimitSettings>,
    /// Model name → provider name.
    #[serde(default)]
    pub models: HashMap<String, String>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(mut self, defaults: RateLimitSettings) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_provider(
        mut self,
        provider: impl Into<String>,
        settings: RateLimitSettings,
    ) -> Self {
        self.providers.insert(provider.into(), settings);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, provider: impl Into<String>) -> Self {
        self.models.insert(model.into(), provider.into());
        self
    }

    /// Resolved admission policy for a provider, applying defaults.
    pub fn limit_for(&self, provider: &str) -> ResolvedLimit {
        match self.providers.get(provider) {
            Some(settings) => settings.merged_over(&self.defaults),
            None => RateLimitSettings::default().merged_over(&self.defaults),
        }
    }
}
