//! Retry wrapper around a single source.
//!
//! # Responsibilities
//! - Repeat retryable failures with exponential backoff + jitter
//! - Shorten the last delay to fit the caller's budget, stop once nothing fits
//!
//! # Design Decisions
//! - Combinators never retry; this wrapper sits outside them
//! - Deterministic errors (unsupported key, invalid requirement) are never retried

use async_trait::async_trait;

use crate::capability::{FieldSet, Requirement};
use crate::config::RetryConfig;
use crate::model::{RequestKey, Response};
use crate::resilience::backoff::backoff_within;
use crate::resilience::timeouts::Budget;
use crate::source::{CombinatorResult, Source, SourceRef};

/// Retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Source that retries its inner source.
pub struct RetryingSource {
    id: String,
    inner: SourceRef,
    policy: RetryPolicy,
}

impl RetryingSource {
    pub fn new(inner: SourceRef, policy: RetryPolicy) -> Self {
        Self {
            id: format!("retrying({})", inner.id()),
            inner,
            policy,
        }
    }
}

#[async_trait]
impl Source for RetryingSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn capability_for(&self, key: &RequestKey) -> FieldSet {
        self.inner.capability_for(key)
    }

    async fn request(
        &self,
        key: &RequestKey,
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.inner.request(key, requirement, budget).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= self.policy.max_attempts {
                return Err(err);
            }

            let Some(delay) = backoff_within(attempt, self.policy.base_delay_ms, self.policy.max_delay_ms, budget)
            else {
                return Err(err);
            };

            tracing::warn!(
                source = %self.inner.id(),
                key = %key,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying source"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CombinatorError, StaticSource};
    use std::sync::Arc;
    use std::time::Duration;

    const POLICY: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 100,
        max_delay_ms: 1000,
    };

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let inner = Arc::new(StaticSource::new("down").failing("HTTP 503"));
        let retrying = RetryingSource::new(inner.clone(), POLICY);

        let err = retrying
            .request(&RequestKey::chain(1), &Requirement::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err, CombinatorError::failed("down", "HTTP 503"));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_respects_budget() {
        let inner = Arc::new(StaticSource::new("down").failing("HTTP 503"));
        let retrying = RetryingSource::new(inner.clone(), POLICY);

        let budget = Budget::within(Duration::from_millis(50));
        let _ = retrying.request(&RequestKey::chain(1), &Requirement::new(), Some(budget)).await;
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_shrinks_to_fit_budget() {
        let inner = Arc::new(StaticSource::new("down").failing("HTTP 503"));
        let slow_policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        };
        let retrying = RetryingSource::new(inner.clone(), slow_policy);

        let started = tokio::time::Instant::now();
        let budget = Budget::within(Duration::from_millis(600));
        let err = retrying
            .request(&RequestKey::chain(1), &Requirement::new(), Some(budget))
            .await
            .unwrap_err();
        assert_eq!(err, CombinatorError::failed("down", "HTTP 503"));
        assert_eq!(inner.calls(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_success_is_not_retried() {
        let key = RequestKey::chain(1);
        let inner = Arc::new(StaticSource::new("up").respond(key.clone(), Response::new().with("gasPrice", 1u64)));
        let retrying = RetryingSource::new(inner.clone(), POLICY);

        assert!(retrying.request(&key, &Requirement::new(), None).await.is_ok());
        assert_eq!(inner.calls(), 1);
    }
}
