//! Bounded async operations with a fallback chain
//!
//! Every call that crosses a remote boundary (advisory, replay generation)
//! goes through [`BoundedCall`]: a per-attempt timeout, a bounded number of
//! retries for recoverable failures, an optional overall budget covering
//! every attempt and backoff, and an optional fallback producer.
//! All timers live inside the returned future, so dropping it cancels the
//! in-flight attempt and any pending backoff.

use std::future::Future;
use std::time::Duration;

use crate::core::error::{Result, SimError};

/// How a bounded call was resolved
#[derive(Debug)]
pub enum Resolved<T> {
    /// The primary operation succeeded
    Primary(T),
    /// The primary failed with the given cause; the fallback produced a value
    Fallback(T, SimError),
    /// Both the primary and the fallback failed (primary cause kept)
    Failed(SimError),
}

impl<T> Resolved<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Resolved::Primary(v) | Resolved::Fallback(v, _) => Some(v),
            Resolved::Failed(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolved::Fallback(..))
    }
}

/// Timeout + retry policy for one kind of remote call
#[derive(Debug, Clone)]
pub struct BoundedCall {
    label: &'static str,
    timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
    /// Wall-clock limit for the whole call, retries included
    budget: Option<Duration>,
}

impl BoundedCall {
    /// Single attempt bounded by `timeout`
    pub fn new(label: &'static str, timeout: Duration) -> Self {
        Self {
            label,
            timeout,
            max_attempts: 1,
            backoff: Duration::ZERO,
            budget: None,
        }
    }

    /// Allow up to `max_attempts` attempts separated by `backoff`
    pub fn with_retries(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Cap the whole call, every attempt and backoff included, at `budget`
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Run `op` under the timeout, retrying recoverable failures, all within
    /// the overall budget when one is set
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(budget) = self.budget else {
            return self.attempts(op).await;
        };
        match tokio::time::timeout(budget, self.attempts(op)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    call = self.label,
                    budget_ms = budget.as_millis() as u64,
                    "bounded call exhausted its budget"
                );
                Err(SimError::Timeout(budget))
            }
        }
    }

    async fn attempts<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let err = match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => SimError::Timeout(self.timeout),
            };

            if attempt >= self.max_attempts || !err.is_recoverable_remote() {
                tracing::warn!(call = self.label, attempt, reason = %err.reason(), "bounded call failed");
                return Err(err);
            }

            tracing::debug!(call = self.label, attempt, reason = %err.reason(), "retrying bounded call");
            attempt += 1;
            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }
    }

    /// Run `op`; on failure try `fallback` once
    pub async fn run_or_else<T, F, Fut, G, GFut>(&self, op: F, fallback: G) -> Resolved<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        G: FnOnce(&SimError) -> GFut,
        GFut: Future<Output = Result<T>>,
    {
        match self.run(op).await {
            Ok(value) => Resolved::Primary(value),
            Err(cause) => match fallback(&cause).await {
                Ok(value) => {
                    tracing::warn!(call = self.label, reason = %cause.reason(), "using fallback result");
                    Resolved::Fallback(value, cause)
                }
                Err(fallback_err) => {
                    tracing::warn!(
                        call = self.label,
                        reason = %cause.reason(),
                        fallback_reason = %fallback_err.reason(),
                        "primary and fallback both failed"
                    );
                    Resolved::Failed(cause)
                }
            },
        }
    }
}
