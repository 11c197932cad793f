//! Combinator tree construction from `SourceSpec`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::combinators::{
    AggregatorCombinator, CachedCombinator, FallbackMergeCombinator, FastestCombinator, PrioritizedCombinator,
};
use crate::config::{CombinatorConfig, SourceSpec};
use crate::model::KeyParseError;
use crate::registry::SourceRegistry;
use crate::resilience::{RetryPolicy, RetryingSource};
use crate::source::{CombinatorError, SourceRef};

/// Errors building a registry or a combinator tree.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("duplicate source id '{0}'")]
    DuplicateSource(String),

    #[error("source '{source_id}' has invalid key '{key}': {error}")]
    InvalidKey {
        source_id: String,
        key: String,
        #[source]
        error: KeyParseError,
    },

    #[error("no [root] topology configured")]
    MissingRoot,

    #[error(transparent)]
    Combinator(#[from] CombinatorError),
}

/// Build the tree described by `spec`.
///
/// `config` supplies defaults for cache and retry nodes.
pub fn build_source(
    spec: &SourceSpec,
    registry: &SourceRegistry,
    config: &CombinatorConfig,
) -> Result<SourceRef, BuildError> {
    let children = |sources: &[SourceSpec]| -> Result<Vec<SourceRef>, BuildError> {
        sources
            .iter()
            .map(|child| build_source(child, registry, config))
            .collect()
    };

    let source: SourceRef = match spec {
        SourceSpec::Static { id } => registry
            .get(id)
            .ok_or_else(|| BuildError::UnknownSource(id.clone()))?,
        SourceSpec::Prioritized { sources } => Arc::new(PrioritizedCombinator::new(children(sources)?)?),
        SourceSpec::Fastest { sources } => Arc::new(FastestCombinator::new(children(sources)?)?),
        SourceSpec::Aggregate { method, sources } => {
            Arc::new(AggregatorCombinator::new(children(sources)?, *method)?)
        }
        SourceSpec::Fallback { sources } => Arc::new(FallbackMergeCombinator::new(children(sources)?)?),
        SourceSpec::Cached {
            source,
            ttl_secs,
            max_entries,
        } => {
            let ttl = Duration::from_secs(ttl_secs.unwrap_or(config.cache.ttl_secs));
            let max_entries = max_entries.or(config.cache.max_entries);
            Arc::new(CachedCombinator::new(
                build_source(source, registry, config)?,
                ttl,
                max_entries,
            ))
        }
        SourceSpec::Retrying { source, max_attempts } => {
            let mut policy = RetryPolicy::from(&config.retries);
            if let Some(max_attempts) = max_attempts {
                policy.max_attempts = (*max_attempts).max(1);
            }
            Arc::new(RetryingSource::new(build_source(source, registry, config)?, policy))
        }
    };

    tracing::debug!(kind = spec.kind(), source = %source.id(), "Built source");
    Ok(source)
}

/// Build the configured `[root]` tree.
pub fn build_root(registry: &SourceRegistry, config: &CombinatorConfig) -> Result<SourceRef, BuildError> {
    let root = config.root.as_ref().ok_or(BuildError::MissingRoot)?;
    build_source(root, registry, config)
}
