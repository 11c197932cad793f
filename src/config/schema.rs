//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combinators::AggregationMethod;
use crate::model::Response;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CombinatorConfig {
    /// Default per-request budget.
    pub timeouts: TimeoutConfig,

    /// Defaults for `cached` nodes.
    pub cache: CacheConfig,

    /// Defaults for `retrying` nodes.
    pub retries: RetryConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Fixture sources, addressable by id from the topology.
    pub sources: Vec<StaticSourceConfig>,

    /// Combinator tree answering requests.
    pub root: Option<SourceSpec>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Budget applied when the caller gives none, in milliseconds.
    pub budget_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { budget_ms: 5000 }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime from insertion, in seconds.
    pub ttl_secs: u64,

    /// Expired entries are purged once this many are held.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 15,
            max_entries: Some(10_000),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A fixture source answering from a fixed table.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StaticSourceConfig {
    pub id: String,

    /// Artificial latency per call, in milliseconds.
    pub latency_ms: u64,

    /// Reject every call with this message.
    pub fail_with: Option<String>,

    /// Responses keyed by request key string (`1`, `1:0x…`, `1:0x…/0x…`).
    pub responses: BTreeMap<String, Response>,
}

/// One node of the combinator tree.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    /// A registered source, by id.
    Static { id: String },

    /// Sources in priority order.
    Prioritized { sources: Vec<SourceSpec> },

    Fastest { sources: Vec<SourceSpec> },

    Aggregate {
        method: AggregationMethod,
        sources: Vec<SourceSpec>,
    },

    Fallback { sources: Vec<SourceSpec> },

    /// Overrides fall back to `[cache]`.
    Cached {
        source: Box<SourceSpec>,
        #[serde(default)]
        ttl_secs: Option<u64>,
        #[serde(default)]
        max_entries: Option<usize>,
    },

    /// Overrides fall back to `[retries]`.
    Retrying {
        source: Box<SourceSpec>,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

impl SourceSpec {
    /// Kind tag as written in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceSpec::Static { .. } => "static",
            SourceSpec::Prioritized { .. } => "prioritized",
            SourceSpec::Fastest { .. } => "fastest",
            SourceSpec::Aggregate { .. } => "aggregate",
            SourceSpec::Fallback { .. } => "fallback",
            SourceSpec::Cached { .. } => "cached",
            SourceSpec::Retrying { .. } => "retrying",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: CombinatorConfig = toml::from_str("").unwrap();
        assert_eq!(config.timeouts.budget_ms, 5000);
        assert_eq!(config.cache.ttl_secs, 15);
        assert_eq!(config.retries.max_attempts, 3);
        assert!(!config.observability.metrics_enabled);
        assert!(config.root.is_none());
    }

    #[test]
    fn test_nested_topology() {
        let config: CombinatorConfig = toml::from_str(
            r#"
            [[sources]]
            id = "etherscan"
            latency_ms = 40

            [sources.responses."1".fast]
            gasPrice = 30

            [root]
            kind = "cached"
            ttl_secs = 5

            [root.source]
            kind = "aggregate"
            method = "median"

            [[root.source.sources]]
            kind = "static"
            id = "etherscan"
            "#,
        )
        .unwrap();

        let root = config.root.unwrap();
        assert_eq!(root.kind(), "cached");
        let SourceSpec::Cached { source, ttl_secs, .. } = root else {
            panic!("expected cached root");
        };
        assert_eq!(ttl_secs, Some(5));
        assert_eq!(
            *source,
            SourceSpec::Aggregate {
                method: AggregationMethod::Median,
                sources: vec![SourceSpec::Static { id: "etherscan".into() }],
            }
        );

        let fast = config.sources[0].responses["1"].get("fast").unwrap();
        assert_eq!(fast.as_group().unwrap().amount("gasPrice"), Some(U256::from(30u64)));
    }
}
