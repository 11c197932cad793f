//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Combinator fan-out:
//!     → timeouts.rs (guard each call at deadline - margin)
//!     → settle.rs (run all to completion, keep the fulfilled ones)
//!
//! Outer wrapper (optional):
//!     → retries.rs (repeat retryable failures)
//!     → backoff.rs (exponential delay with jitter)
//! ```
//!
//! # Design Decisions
//! - Every guarded call has a deadline when the caller supplies a budget
//! - A single source's rejection never aborts its siblings
//! - Retry lives outside the combinators so they stay freely composable

pub mod backoff;
pub mod retries;
pub mod settle;
pub mod timeouts;

pub use retries::{RetryPolicy, RetryingSource};
pub use settle::{settle_all, Settled};
pub use timeouts::{Budget, TimeoutGuard, TIMEOUT_MARGIN};
