//! Source registry and topology building.
//!
//! # Data Flow
//! ```text
//! [[sources]] fixtures ─┐
//! custom adapters ──────┴→ SourceRegistry (id → Arc<dyn Source>)
//!
//! [root] SourceSpec + SourceRegistry + config defaults
//!     → builder.rs build_source
//!     → combinator tree (Arc<dyn Source>)
//! ```
//!
//! # Design Decisions
//! - The registry is a constructed value, not a global
//! - A tree node may reference the same registered source more than once

pub mod builder;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StaticSourceConfig;
use crate::model::RequestKey;
use crate::source::{SourceRef, StaticSource};

pub use builder::{build_source, BuildError};

/// Registered sources by id.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceRef>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding one fixture per `[[sources]]` entry.
    pub fn from_fixtures(configs: &[StaticSourceConfig]) -> Result<Self, BuildError> {
        let mut registry = Self::new();
        for config in configs {
            let source = fixture_from_config(config)?;
            if registry.register(Arc::new(source)).is_some() {
                return Err(BuildError::DuplicateSource(config.id.clone()));
            }
        }
        Ok(registry)
    }

    /// Add `source` under its own id, returning any source it replaced.
    pub fn register(&mut self, source: SourceRef) -> Option<SourceRef> {
        let id = source.id().to_string();
        tracing::debug!(source = %id, "Registered source");
        self.sources.insert(id, source)
    }

    pub fn get(&self, id: &str) -> Option<SourceRef> {
        self.sources.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn fixture_from_config(config: &StaticSourceConfig) -> Result<StaticSource, BuildError> {
    let mut source = StaticSource::new(&config.id).with_latency(Duration::from_millis(config.latency_ms));
    for (raw, response) in &config.responses {
        let key: RequestKey = raw.parse().map_err(|error| BuildError::InvalidKey {
            source_id: config.id.clone(),
            key: raw.clone(),
            error,
        })?;
        source = source.respond(key, response.clone());
    }
    if let Some(message) = &config.fail_with {
        source = source.failing(message.clone());
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Requirement;
    use crate::model::Response;

    fn config(id: &str, key: &str) -> StaticSourceConfig {
        StaticSourceConfig {
            id: id.into(),
            responses: [(key.to_string(), Response::new().with("gasPrice", 12u64))].into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fixtures_answer_configured_keys() {
        let registry = SourceRegistry::from_fixtures(&[config("a", "1"), config("b", "10")]).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b"]);

        let a = registry.get("a").unwrap();
        let response = a.request(&RequestKey::chain(1), &Requirement::new(), None).await.unwrap();
        assert_eq!(response.amount("gasPrice"), Some(alloy::primitives::U256::from(12u64)));
        assert!(a.capability_for(&RequestKey::chain(10)).is_empty());
    }

    #[test]
    fn test_fixture_errors() {
        let err = SourceRegistry::from_fixtures(&[config("a", "1"), config("a", "2")]).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateSource(id) if id == "a"));

        let err = SourceRegistry::from_fixtures(&[config("a", "1:zz")]).unwrap_err();
        assert!(matches!(err, BuildError::InvalidKey { .. }));
    }
}
