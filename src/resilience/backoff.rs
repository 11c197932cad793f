//! Exponential backoff with jitter, fitted to the caller's budget.

use std::time::Duration;

use rand::Rng;

use crate::resilience::timeouts::{Budget, TIMEOUT_MARGIN};

/// Delay before retry number `attempt` (1-based): `base_ms` doubled per
/// attempt, capped at `max_ms`, plus up to 10% jitter.
///
/// With a budget the delay shrinks so `TIMEOUT_MARGIN` is still left for the
/// next attempt. `None` when the budget cannot hold even that.
pub fn backoff_within(attempt: u32, base_ms: u64, max_ms: u64, budget: Option<Budget>) -> Option<Duration> {
    let doublings = attempt.saturating_sub(1).min(63);
    let nominal = base_ms.saturating_mul(1u64 << doublings).min(max_ms);
    let jitter = rand::thread_rng().gen_range(0..=nominal / 10);
    let delay = Duration::from_millis(nominal.saturating_add(jitter));

    let Some(budget) = budget else {
        return Some(delay);
    };
    let spare = budget.remaining().checked_sub(TIMEOUT_MARGIN)?;
    if spare.is_zero() {
        return None;
    }
    Some(delay.min(spare))
}
