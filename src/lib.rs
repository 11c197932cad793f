//! Combinators for unreliable, partially-overlapping fact sources.
//!
//! Gas prices, swap quotes, token metadata and spot prices come from many
//! independent providers. Each provider is a [`Source`]; combinators are
//! sources built from other sources, so trees nest arbitrarily:
//!
//! ```text
//! Cached(Fastest(Prioritized(a, b), Aggregator(c, d, e)))
//! ```

// Core model
pub mod capability;
pub mod model;
pub mod source;

// Combinators and their shared machinery
pub mod combinators;
pub mod resilience;

// Wiring
pub mod config;
pub mod registry;

// Cross-cutting concerns
pub mod observability;

pub use capability::{CapabilityMatrix, FieldSet, Requirement};
pub use combinators::{
    AggregationMethod, AggregatorCombinator, CachedCombinator, FallbackMergeCombinator, FastestCombinator,
    PrioritizedCombinator,
};
pub use config::CombinatorConfig;
pub use model::{BatchResponse, RequestKey, Response};
pub use registry::{build_source, SourceRegistry};
pub use resilience::{Budget, RetryingSource, TIMEOUT_MARGIN};
pub use source::{CombinatorError, CombinatorResult, Source, SourceRef, StaticSource};
