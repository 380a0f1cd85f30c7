//! Bounded exponential backoff around a single provider call.
//!
//! Only [`ProviderErrorKind::Unavailable`] failures are retried. Rate-limit
//! and every other failure surface on the first occurrence. When the attempt
//! budget runs out on unavailability the caller gets
//! [`Error::RetriesExhausted`] with the last failure attached.
//!
//! [`ProviderErrorKind::Unavailable`]: skillai_core::ProviderErrorKind::Unavailable

use skillai_core::config::RetryConfig;
use skillai_core::{Error, ProviderError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 2,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            backoff_multiplier: cfg.backoff_multiplier.max(1),
        }
    }
}

impl RetryPolicy {
    /// Waits between consecutive attempts: `max_attempts - 1` entries.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delay = self.initial_delay;
        let mut out = Vec::new();
        for _ in 1..self.max_attempts {
            out.push(delay);
            delay = delay.saturating_mul(self.backoff_multiplier);
        }
        out
    }
}

/// Run `f` until it succeeds, fails non-transiently, or the budget is spent.
///
/// Every attempt is a fresh invocation of `f`.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ProviderError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Provider call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() => {
                if attempt >= max_attempts {
                    warn!(error = %e, attempts = attempt, "Provider still unavailable, giving up");
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Service unavailable, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(policy.backoff_multiplier);
                attempt += 1;
            }
            Err(e) => {
                warn!(error = %e, kind = ?e.kind, attempt, "Provider call failed, not retrying");
                return Err(Error::Provider(e));
            }
        }
    }
}
