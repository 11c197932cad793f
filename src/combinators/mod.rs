//! Combinators: sources built from other sources.
//!
//! # Data Flow
//! ```text
//! request(key, requirement, budget)
//!     → support.rs eligible()       capability filter, fails before I/O
//!     → one of:
//!         prioritized.rs   sequential, first valid wins
//!         fastest.rs       concurrent, first valid wins
//!         aggregator.rs    concurrent, settle all, cohort + shape, reduce
//!         fallback.rs      concurrent batch, per-field merge, early exit
//!     → support.rs finish()         outcome metric
//!
//! cached.rs wraps any of the above (or a plain source) with a shared TTL cache
//! ```
//!
//! # Design Decisions
//! - Every combinator implements `Source`, so `Cached(Fastest(Prioritized(..), Aggregator(..)))` just works
//! - Construction rejects empty source lists
//! - No combinator retries; wrap a source in `RetryingSource` for that
//! - All per-call state lives in the call; only the cache is shared

pub mod aggregator;
pub mod cached;
pub mod fallback;
pub mod fastest;
pub mod prioritized;
pub(crate) mod support;

pub use aggregator::{AggregationMethod, AggregatorCombinator};
pub use cached::CachedCombinator;
pub use fallback::FallbackMergeCombinator;
pub use fastest::FastestCombinator;
pub use prioritized::PrioritizedCombinator;
