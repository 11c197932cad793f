//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (topology references existing sources)
//! - Validate value ranges (budgets > 0, retry bounds ordered)
//! - Reject unparsable request keys in fixture tables
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CombinatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{CombinatorConfig, SourceSpec};
use crate::model::RequestKey;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// One semantic problem, located by its config path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &CombinatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeouts.budget_ms == 0 {
        errors.push(ValidationError::new("timeouts.budget_ms", "must be greater than 0"));
    }
    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be greater than 0"));
    }
    if config.cache.max_entries == Some(0) {
        errors.push(ValidationError::new("cache.max_entries", "must be greater than 0"));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    let mut ids = BTreeSet::new();
    for (i, source) in config.sources.iter().enumerate() {
        if source.id.is_empty() {
            errors.push(ValidationError::new(format!("sources[{i}].id"), "must not be empty"));
        } else if !ids.insert(source.id.as_str()) {
            errors.push(ValidationError::new(
                format!("sources[{i}].id"),
                format!("duplicate source id '{}'", source.id),
            ));
        }
        for key in source.responses.keys() {
            if let Err(e) = key.parse::<RequestKey>() {
                errors.push(ValidationError::new(
                    format!("sources[{i}].responses"),
                    format!("invalid request key '{key}': {e}"),
                ));
            }
        }
    }

    if let Some(root) = &config.root {
        validate_spec(root, "root", &ids, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_spec(spec: &SourceSpec, path: &str, ids: &BTreeSet<&str>, errors: &mut Vec<ValidationError>) {
    match spec {
        SourceSpec::Static { id } => {
            if !ids.contains(id.as_str()) {
                errors.push(ValidationError::new(
                    format!("{path}.id"),
                    format!("unknown source '{id}'"),
                ));
            }
        }
        SourceSpec::Prioritized { sources }
        | SourceSpec::Fastest { sources }
        | SourceSpec::Aggregate { sources, .. }
        | SourceSpec::Fallback { sources } => {
            if sources.is_empty() {
                errors.push(ValidationError::new(
                    format!("{path}.sources"),
                    format!("{} needs at least one source", spec.kind()),
                ));
            }
            for (i, child) in sources.iter().enumerate() {
                validate_spec(child, &format!("{path}.sources[{i}]"), ids, errors);
            }
        }
        SourceSpec::Cached { source, ttl_secs, max_entries } => {
            if *ttl_secs == Some(0) {
                errors.push(ValidationError::new(format!("{path}.ttl_secs"), "must be greater than 0"));
            }
            if *max_entries == Some(0) {
                errors.push(ValidationError::new(format!("{path}.max_entries"), "must be greater than 0"));
            }
            validate_spec(source, &format!("{path}.source"), ids, errors);
        }
        SourceSpec::Retrying { source, max_attempts } => {
            if *max_attempts == Some(0) {
                errors.push(ValidationError::new(format!("{path}.max_attempts"), "must be at least 1"));
            }
            validate_spec(source, &format!("{path}.source"), ids, errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StaticSourceConfig;

    fn fixture(id: &str) -> StaticSourceConfig {
        StaticSourceConfig {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CombinatorConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = CombinatorConfig::default();
        config.timeouts.budget_ms = 0;
        config.retries.max_attempts = 0;
        config.observability.log_level = "loud".into();
        config.sources = vec![fixture("a"), fixture("a")];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["timeouts.budget_ms", "retries.max_attempts", "observability.log_level", "sources[1].id"]
        );
    }

    #[test]
    fn test_topology_references() {
        let mut config = CombinatorConfig::default();
        config.sources = vec![fixture("a")];
        config.root = Some(SourceSpec::Cached {
            source: Box::new(SourceSpec::Fastest {
                sources: vec![SourceSpec::Static { id: "a".into() }, SourceSpec::Static { id: "b".into() }],
            }),
            ttl_secs: None,
            max_entries: None,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::new("root.source.sources[1].id", "unknown source 'b'")]
        );
    }

    #[test]
    fn test_empty_combinator_and_bad_key() {
        let mut config = CombinatorConfig::default();
        let mut source = fixture("a");
        source.responses.insert("mainnet".into(), Default::default());
        config.sources = vec![source];
        config.root = Some(SourceSpec::Fallback { sources: Vec::new() });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "sources[0].responses");
        assert_eq!(errors[1].to_string(), "root.sources: fallback needs at least one source");
    }
}
