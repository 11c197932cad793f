//! Error definitions shared by sources and combinators.

use thiserror::Error;

use crate::model::RequestKey;

/// Errors that can occur while fetching or combining facts.
///
/// `Clone` so one failed pending call can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CombinatorError {
    /// No source declares coverage for the key.
    #[error("no source supports {key} with the given requirements")]
    UnsupportedKey { key: RequestKey },

    /// Every attempted source rejected or timed out.
    #[error("all {attempted} sources failed for {key}")]
    AllSourcesFailed { key: RequestKey, attempted: usize },

    /// Responses arrived but none satisfied the requirement.
    #[error("none of the {received} responses for {key} met the requirements")]
    NoValidResponses { key: RequestKey, received: usize },

    /// A required field no configured source can ever provide.
    #[error("no source can provide {fields:?} for {key}")]
    InvalidRequirement { key: RequestKey, fields: Vec<String> },

    /// A guarded call hit its deadline.
    #[error("source {source_id} timed out")]
    Timeout { source_id: String },

    /// A source rejected the request.
    #[error("source {source_id} failed: {message}")]
    Source { source_id: String, message: String },

    /// A combinator was built without sources.
    #[error("{combinator} combinator needs at least one source")]
    NoSources { combinator: &'static str },
}

impl CombinatorError {
    /// Shorthand for a source-level failure.
    pub fn failed(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Source { .. } | Self::AllSourcesFailed { .. }
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedKey { .. } => "unsupported_key",
            Self::AllSourcesFailed { .. } => "all_sources_failed",
            Self::NoValidResponses { .. } => "no_valid_responses",
            Self::InvalidRequirement { .. } => "invalid_requirement",
            Self::Timeout { .. } => "timeout",
            Self::Source { .. } => "source",
            Self::NoSources { .. } => "no_sources",
        }
    }
}

/// Result type for source and combinator operations.
pub type CombinatorResult<T> = Result<T, CombinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CombinatorError::AllSourcesFailed {
            key: RequestKey::chain(1),
            attempted: 3,
        };
        assert_eq!(err.to_string(), "all 3 sources failed for 1");

        let err = CombinatorError::failed("open-ocean", "HTTP 502");
        assert_eq!(err.to_string(), "source open-ocean failed: HTTP 502");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(CombinatorError::Timeout { source_id: "a".into() }.is_retryable());
        assert!(!CombinatorError::UnsupportedKey { key: RequestKey::chain(1) }.is_retryable());
        assert!(!CombinatorError::InvalidRequirement {
            key: RequestKey::chain(1),
            fields: vec!["fast".into()],
        }
        .is_retryable());
    }
}
