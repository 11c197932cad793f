//! Source contract.
//!
//! # Responsibilities
//! - Define the one interface shared by provider adapters and combinators
//! - Carry the error type every layer reports through
//! - Provide a fixture source with scripted latency and failures
//!
//! # Design Decisions
//! - Sources are stateless and shared behind `Arc<dyn Source>`
//! - Combinators are sources too, so trees nest arbitrarily
//! - Batch requests default to concurrent per-key requests

pub mod error;
pub mod fixture;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::capability::{FieldSet, Requirement};
use crate::model::{BatchResponse, RequestKey, Response};
use crate::resilience::timeouts::Budget;

pub use error::{CombinatorError, CombinatorResult};
pub use fixture::StaticSource;

/// Shared handle to any source.
pub type SourceRef = Arc<dyn Source>;

/// A provider of facts, or a combinator over providers.
#[async_trait]
pub trait Source: Send + Sync {
    /// Identifier used in logs and metrics.
    fn id(&self) -> &str;

    /// Declared coverage for `key`. Pure and constant per source.
    fn capability_for(&self, key: &RequestKey) -> FieldSet;

    /// Fetch facts for one key.
    async fn request(
        &self,
        key: &RequestKey,
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<Response>;

    /// Fetch facts for several keys in one call.
    ///
    /// Succeeds when at least one key succeeds; failed keys are absent
    /// from the result.
    async fn request_batch(
        &self,
        keys: &[RequestKey],
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<BatchResponse> {
        let outcomes = join_all(keys.iter().map(|key| async move {
            (key, self.request(key, requirement, budget).await)
        }))
        .await;

        let mut batch = BatchResponse::new();
        let mut last_error = None;
        for (key, outcome) in outcomes {
            match outcome {
                Ok(response) => {
                    batch.insert(key.clone(), response);
                }
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) if batch.is_empty() => Err(e),
            _ => Ok(batch),
        }
    }
}

impl fmt::Debug for dyn Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").field("id", &self.id()).finish()
    }
}
