//! Retry with exponential backoff, implemented once and parameterized per
//! call site. Navigation, filter interaction, and API submission all run
//! through [`RetryPolicy::run`] with their own attempt/delay settings and
//! their own recoverability classification.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::cancel::CancelToken;

/// How a failed attempt should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Transient — retry after the policy's backoff delay.
    Retry,
    /// Transient, and the far side said when to come back (429 Retry-After).
    RetryAfter(Duration),
    /// Non-recoverable — report immediately, no further attempts.
    Fatal,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
    pub cap: Duration,
}

impl RetryPolicy {
    /// Browser interaction steps: 3 attempts, 250ms base, x2, capped at 4s.
    pub const INTERACTION: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(250),
        factor: 2,
        cap: Duration::from_secs(4),
    };

    /// Upstream API calls: 3 attempts, 500ms base, x2, capped at 8s.
    pub const SUBMISSION: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(500),
        factor: 2,
        cap: Duration::from_secs(8),
    };

    /// Backoff delay before retry number `attempt + 1` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.factor.saturating_pow(attempt))
            .min(self.cap)
    }

    /// Run `op` until it succeeds, a non-recoverable failure is seen, the
    /// attempt budget is spent, or the token cancels. Every retry reissues
    /// the operation from scratch; nothing from a failed attempt carries
    /// over.
    pub async fn run<T, E, F, Fut>(
        &self,
        op: &str,
        cancel: &CancelToken,
        classify: impl Fn(&E) -> Recovery,
        mut f: F,
    ) -> Result<Attempted<T>, RetryFailure>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryFailure::Cancelled);
            }

            match f().await {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt + 1,
                    })
                }
                Err(e) => {
                    let attempts = attempt + 1;
                    let recovery = classify(&e);

                    if recovery == Recovery::Fatal {
                        return Err(RetryFailure::Fatal {
                            attempts,
                            cause: e.to_string(),
                        });
                    }
                    if attempts >= self.max_attempts {
                        return Err(RetryFailure::Exhausted {
                            attempts,
                            cause: e.to_string(),
                        });
                    }

                    let delay = match recovery {
                        Recovery::RetryAfter(hint) => hint.min(self.cap),
                        _ => self.delay_for(attempt),
                    };
                    let jitter = Duration::from_millis(rand::rng().random_range(0..100));
                    warn!(
                        op,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay + jitter).await;
                }
            }
            attempt += 1;
        }
    }
}

/// Successful result plus how many attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug)]
pub enum RetryFailure {
    /// Cancellation observed before an attempt was started.
    Cancelled,
    /// Attempt budget spent on recoverable failures. `cause` is the last error.
    Exhausted { attempts: u32, cause: String },
    /// A non-recoverable failure; no further attempts were made.
    Fatal { attempts: u32, cause: String },
}
