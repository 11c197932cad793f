//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Combinators and sources produce:
//!     → logging.rs (structured tracing events: source, key, outcome)
//!     → metrics.rs (counters, histograms, gauges)
//!
//! Consumers:
//!     → stderr log output
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Per-source outcomes log at debug; only the combined outcome is surfaced to callers
//! - Metric updates are cheap and safe without a recorder

pub mod logging;
pub mod metrics;
