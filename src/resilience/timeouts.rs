//! Timeout enforcement.
//!
//! # Responsibilities
//! - Represent a caller's time budget as an absolute deadline
//! - Wrap one in-flight call with a deadline minus a fixed safety margin
//! - Cancel the call cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; one timer per guarded call
//! - Timing out drops the pending future, which cancels its I/O
//! - Timeout errors are distinct from source failures

use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::source::{CombinatorError, CombinatorResult};

/// Time reserved for a combinator's own post-processing.
pub const TIMEOUT_MARGIN: Duration = Duration::from_millis(100);

/// Absolute deadline for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    deadline: Instant,
}

impl Budget {
    /// Budget ending `duration` from now.
    pub fn within(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left; zero once the deadline has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// The same budget with `margin` held back.
    pub fn reserve(&self, margin: Duration) -> Self {
        let now = Instant::now();
        let deadline = self
            .deadline
            .checked_sub(margin)
            .map_or(now, |reduced| reduced.max(now));
        Self { deadline }
    }
}

/// Deadline-bounded wrapper for one pending call.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    cutoff: Option<Budget>,
}

impl TimeoutGuard {
    /// Guard firing at `budget - TIMEOUT_MARGIN`. No budget, no timer.
    pub fn new(budget: Option<Budget>) -> Self {
        Self::with_margin(budget, TIMEOUT_MARGIN)
    }

    pub fn with_margin(budget: Option<Budget>, margin: Duration) -> Self {
        Self {
            cutoff: budget.map(|budget| budget.reserve(margin)),
        }
    }

    /// Budget to hand to the guarded source.
    pub fn inner_budget(&self) -> Option<Budget> {
        self.cutoff
    }

    /// Await `call`, rejecting it with `Timeout` once the cutoff passes.
    pub async fn run<F, T>(&self, source_id: &str, call: F) -> CombinatorResult<T>
    where
        F: Future<Output = CombinatorResult<T>>,
    {
        let Some(cutoff) = self.cutoff else {
            return call.await;
        };

        match timeout_at(cutoff.deadline(), call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::debug!(source = %source_id, "Guarded call timed out");
                Err(CombinatorError::Timeout {
                    source_id: source_id.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn slow(delay_ms: u64) -> CombinatorResult<u32> {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(7)
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_budget_no_timer() {
        let guard = TimeoutGuard::new(None);
        assert_eq!(guard.inner_budget(), None);
        assert_eq!(guard.run("a", slow(60_000)).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_before_deadline_by_margin() {
        let guard = TimeoutGuard::new(Some(Budget::within(Duration::from_millis(500))));

        // Finishes inside the budget but after the margin cutoff.
        let err = guard.run("slow", slow(450)).await.unwrap_err();
        assert_eq!(err, CombinatorError::Timeout { source_id: "slow".into() });

        let guard = TimeoutGuard::new(Some(Budget::within(Duration::from_millis(500))));
        assert_eq!(guard.run("quick", slow(350)).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reserve_never_goes_before_now() {
        let budget = Budget::within(Duration::from_millis(50));
        let reserved = budget.reserve(TIMEOUT_MARGIN);
        assert_eq!(reserved.remaining(), Duration::ZERO);

        let guard = TimeoutGuard::new(Some(budget));
        assert!(guard.run("late", slow(1)).await.is_err());
    }
}
