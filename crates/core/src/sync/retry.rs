//! Retry policy: attempt count and failure class in, next status out

use std::collections::HashMap;
use std::time::Duration;

use crmsync_domain::{FailureClass, ProvidersConfig, RetryConfig, ProviderId, SyncStatus};

/// Exponential backoff `base * 2^(attempts-1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.base.checked_mul(1u32 << exponent).map_or(self.max, |d| d.min(self.max))
    }
}

/// What to do with an item after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Eligible again once `delay` has passed.
    RetryAfter(Duration),
    GiveUp,
}

impl RetryDecision {
    pub fn status(self) -> SyncStatus {
        match self {
            Self::RetryAfter(_) => SyncStatus::FailedRetryable,
            Self::GiveUp => SyncStatus::FailedTerminal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub backoff: Option<Backoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            min_delay: Duration::from_secs(config.min_delay_secs),
            backoff: config.backoff_base_secs.map(|base| Backoff {
                base: Duration::from_secs(base),
                max: Duration::from_secs(config.max_backoff_secs),
            }),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), ..Self::default() }
    }

    /// Decide against this policy's own attempt cap.
    pub fn decide(&self, attempts: u32, class: FailureClass) -> RetryDecision {
        self.decide_with_cap(attempts, self.max_attempts, class)
    }

    /// Decide against an explicit cap (the one stamped on the item).
    pub fn decide_with_cap(&self, attempts: u32, cap: u32, class: FailureClass) -> RetryDecision {
        match class {
            FailureClass::Permanent => RetryDecision::GiveUp,
            FailureClass::Transient if attempts >= cap => RetryDecision::GiveUp,
            FailureClass::Transient => RetryDecision::RetryAfter(self.delay_for(attempts)),
        }
    }

    /// Delay before the next attempt; zero means "next tick".
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let backoff = self.backoff.map_or(Duration::ZERO, |b| b.delay_for(attempts));
        backoff.max(self.min_delay)
    }
}

/// Default policy plus per-provider overrides.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicies {
    default: RetryPolicy,
    overrides: HashMap<ProviderId, RetryPolicy>,
}

impl RetryPolicies {
    pub fn new(default: RetryPolicy) -> Self {
        Self { default, overrides: HashMap::new() }
    }

    /// Build from the `sync.retry` section and `providers.*.retry` overrides.
    pub fn from_config(default: &RetryConfig, providers: &ProvidersConfig) -> Self {
        let mut policies = Self::new(RetryPolicy::from(default));
        for (provider, retry) in providers.retry_overrides() {
            policies = policies.with_override(provider, RetryPolicy::from(retry));
        }
        policies
    }

    #[must_use]
    pub fn with_override(mut self, provider: impl Into<ProviderId>, policy: RetryPolicy) -> Self {
        self.overrides.insert(provider.into(), policy);
        self
    }

    pub fn for_provider(&self, provider: &ProviderId) -> &RetryPolicy {
        self.overrides.get(provider).unwrap_or(&self.default)
    }

    pub fn default_policy(&self) -> &RetryPolicy {
        &self.default
    }
}
