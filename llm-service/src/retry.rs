//! Bounded-attempt retry with exponential backoff and a per-attempt timeout.
//!
//! The policy is shared by embedding calls, chat completions and vector store
//! operations. Callers only decide *what* is retryable through [`Retryable`];
//! the policy decides *when* and *how often*.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error_handler::{ConfigError, Result, env_opt_u32, env_opt_u64};

/// Error types the retry loop knows how to classify.
pub trait Retryable: Sized {
    /// `true` if another attempt may succeed.
    fn is_transient(&self) -> bool;

    /// Builds the error reported when a single attempt hits its timeout.
    /// Timeouts are always treated as transient by the loop.
    fn timed_out(after: Duration) -> Self;
}

/// Error returned once the retry loop gives up.
#[derive(Debug)]
pub struct Retried<E> {
    /// Number of attempts actually made (at least 1).
    pub attempts: u32,
    /// The last error observed.
    pub error: E,
}

impl<E: Retryable> Retried<E> {
    /// `true` when the loop stopped because attempts ran out on a transient
    /// failure, as opposed to a permanent one that was never retried.
    pub fn exhausted(&self) -> bool {
        self.error.is_transient()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always >= 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Timeout applied to every attempt; `None` disables it.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff. Handy for tests and one-shot tools.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Builds a policy from the environment, falling back to defaults.
    ///
    /// # Env
    /// - `RETRY_MAX_ATTEMPTS` (default 4)
    /// - `RETRY_INITIAL_BACKOFF_MS` (default 500)
    /// - `RETRY_MAX_BACKOFF_MS` (default 8000)
    /// - `PROVIDER_TIMEOUT_SECS` (default 30, `0` disables the per-attempt timeout)
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let policy = Self {
            max_attempts: env_opt_u32("RETRY_MAX_ATTEMPTS")?.unwrap_or(d.max_attempts),
            initial_backoff: env_opt_u64("RETRY_INITIAL_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(d.initial_backoff),
            max_backoff: env_opt_u64("RETRY_MAX_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(d.max_backoff),
            multiplier: d.multiplier,
            attempt_timeout: match env_opt_u64("PROVIDER_TIMEOUT_SECS")? {
                Some(0) => None,
                Some(s) => Some(Duration::from_secs(s)),
                None => d.attempt_timeout,
            },
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_attempts",
                detail: "expected at least 1",
            }
            .into());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "multiplier",
                detail: "expected a finite value >= 1.0",
            }
            .into());
        }
        if self.initial_backoff > self.max_backoff {
            return Err(ConfigError::OutOfRange {
                field: "initial_backoff",
                detail: "must not exceed max_backoff",
            }
            .into());
        }
        Ok(())
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exp);
        let capped = scaled.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `what` names the operation in logs (e.g. `"embed batch 3"`).
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> std::result::Result<T, Retried<E>>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, op()).await {
                    Ok(r) => r,
                    Err(_) => Err(E::timed_out(limit)),
                },
                None => op().await,
            };

            match outcome {
                Ok(v) => {
                    if attempt > 1 {
                        debug!(operation = what, attempt, "succeeded after retry");
                    }
                    return Ok(v);
                }
                Err(e) if !e.is_transient() => {
                    return Err(Retried {
                        attempts: attempt,
                        error: e,
                    });
                }
                Err(e) if attempt >= max => {
                    warn!(operation = what, attempts = attempt, error = %e, "giving up after retries");
                    return Err(Retried {
                        attempts: attempt,
                        error: e,
                    });
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation = what,
                        attempt,
                        max_attempts = max,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestErr {
        Flaky,
        Broken,
        Slow,
    }

    impl std::fmt::Display for TestErr {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for TestErr {
        fn is_transient(&self) -> bool {
            !matches!(self, TestErr::Broken)
        }
        fn timed_out(_: Duration) -> Self {
            TestErr::Slow
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
            multiplier: 2.0,
            attempt_timeout: Some(Duration::from_secs(1)),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = fast_policy(5);
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(250));
        assert_eq!(p.backoff(30), Duration::from_millis(250));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(fast_policy(0).validate().is_err());
        assert!(RetryPolicy::default().validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out = fast_policy(4)
            .run("flaky", move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TestErr::Flaky)
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out: std::result::Result<(), _> = fast_policy(4)
            .run("broken", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(TestErr::Broken)
                }
            })
            .await;
        let err = out.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(!err.exhausted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_count_as_transient_and_exhaust() {
        let out: std::result::Result<(), _> = fast_policy(3)
            .run("sleepy", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        let err = out.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.error, TestErr::Slow));
        assert!(err.exhausted());
    }
}
