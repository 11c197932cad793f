//! Fixture source with fixed responses.
//!
//! Used for dry runs from configuration and in tests. Latency and
//! failures are scripted; every call is counted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::{CapabilityMatrix, FieldSet, Requirement};
use crate::model::{RequestKey, Response};
use crate::resilience::timeouts::Budget;
use crate::source::{CombinatorError, CombinatorResult, Source};

/// A source answering from a fixed table.
#[derive(Debug)]
pub struct StaticSource {
    id: String,
    latency: Duration,
    failure: Option<String>,
    responses: BTreeMap<RequestKey, Response>,
    declared: Option<CapabilityMatrix>,
    derived: CapabilityMatrix,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            latency: Duration::ZERO,
            failure: None,
            responses: BTreeMap::new(),
            declared: None,
            derived: CapabilityMatrix::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer `key` with `response`.
    pub fn respond(mut self, key: RequestKey, response: Response) -> Self {
        let fields = FieldSet::present(response.field_names());
        self.derived.declare(key.chain_id, &fields);
        self.responses.insert(key, response);
        self
    }

    /// Delay every answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject every call (after the latency) with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Override the capability derived from the responses.
    pub fn declaring(mut self, matrix: CapabilityMatrix) -> Self {
        self.declared = Some(matrix);
        self
    }

    /// Number of `request` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for StaticSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn capability_for(&self, key: &RequestKey) -> FieldSet {
        self.declared
            .as_ref()
            .unwrap_or(&self.derived)
            .supports(key)
    }

    async fn request(
        &self,
        key: &RequestKey,
        _requirement: &Requirement,
        _budget: Option<Budget>,
    ) -> CombinatorResult<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(message) = &self.failure {
            return Err(CombinatorError::failed(&self.id, message.clone()));
        }

        self.responses
            .get(key)
            .cloned()
            .ok_or_else(|| CombinatorError::failed(&self.id, format!("no data for {key}")))
    }
}
