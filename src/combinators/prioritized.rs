//! Prioritized combinator: sources strictly in order.

use async_trait::async_trait;

use crate::capability::{did_satisfy, FieldSet, Requirement};
use crate::combinators::support::{call_source, combined_capability, composite_id, eligible, finish, non_empty};
use crate::model::{RequestKey, Response};
use crate::resilience::{Budget, TimeoutGuard};
use crate::source::{CombinatorError, CombinatorResult, Source, SourceRef};

/// Tries sources one at a time; the first valid answer wins.
///
/// Lower-priority sources are never contacted once a higher one answers.
/// All attempts share the caller's deadline.
#[derive(Debug)]
pub struct PrioritizedCombinator {
    id: String,
    sources: Vec<SourceRef>,
}

impl PrioritizedCombinator {
    /// `sources` in priority order, highest first.
    pub fn new(sources: Vec<SourceRef>) -> CombinatorResult<Self> {
        let sources = non_empty(sources, "prioritized")?;
        Ok(Self {
            id: composite_id("prioritized", &sources),
            sources,
        })
    }

    async fn resolve(
        &self,
        key: &RequestKey,
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<Response> {
        let candidates = eligible(&self.sources, key, requirement)?;
        let guard = TimeoutGuard::new(budget);

        for source in &candidates {
            match call_source(source, key, requirement, &guard).await {
                Ok(response) if did_satisfy(&response, requirement) => return Ok(response),
                Ok(_) => {
                    tracing::debug!(source = %source.id(), key = %key, "Response missed required fields");
                }
                Err(_) => {}
            }
        }

        Err(CombinatorError::AllSourcesFailed {
            key: key.clone(),
            attempted: candidates.len(),
        })
    }
}

#[async_trait]
impl Source for PrioritizedCombinator {
    fn id(&self) -> &str {
        &self.id
    }

    fn capability_for(&self, key: &RequestKey) -> FieldSet {
        combined_capability(&self.sources, key)
    }

    async fn request(
        &self,
        key: &RequestKey,
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<Response> {
        finish("prioritized", self.resolve(key, requirement, budget).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityMatrix;
    use crate::source::StaticSource;
    use std::sync::Arc;
    use std::time::Duration;

    fn gas(price: u64) -> Response {
        Response::new().with("standard", Response::new().with("gasPrice", price))
    }

    #[tokio::test]
    async fn test_first_valid_wins_and_stops() {
        let key = RequestKey::chain(1);
        let first = Arc::new(StaticSource::new("first").respond(key.clone(), gas(10)));
        let second = Arc::new(StaticSource::new("second").respond(key.clone(), gas(20)));
        let combinator = PrioritizedCombinator::new(vec![first.clone(), second.clone()]).unwrap();

        let response = combinator.request(&key, &Requirement::new().require("standard"), None).await.unwrap();
        assert_eq!(response, gas(10));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_skips_failures_and_invalid_responses() {
        let key = RequestKey::chain(1);
        let declares_fast = CapabilityMatrix::new().with_chain(1, FieldSet::present(["standard", "fast"]));
        let broken = Arc::new(StaticSource::new("broken").respond(key.clone(), gas(1)).failing("HTTP 500"));
        let incomplete = Arc::new(
            StaticSource::new("incomplete")
                .respond(key.clone(), gas(2))
                .declaring(declares_fast),
        );
        let complete = Arc::new(
            StaticSource::new("complete")
                .respond(key.clone(), gas(3).with("fast", Response::new().with("gasPrice", 4u64))),
        );
        let combinator = PrioritizedCombinator::new(vec![
            broken.clone(),
            incomplete.clone(),
            complete.clone(),
        ])
        .unwrap();

        let requirement = Requirement::new().require("fast");
        let response = combinator.request(&key, &requirement, None).await.unwrap();
        assert!(response.contains("fast"));
        // `broken` never declared `fast`, so it is filtered before any call.
        assert_eq!(broken.calls(), 0);
        assert_eq!(incomplete.calls(), 1);
        assert_eq!(complete.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_list_fails() {
        let key = RequestKey::chain(1);
        let slow = Arc::new(
            StaticSource::new("slow")
                .respond(key.clone(), gas(1))
                .with_latency(Duration::from_secs(5)),
        );
        let down = Arc::new(StaticSource::new("down").respond(key.clone(), gas(1)).failing("HTTP 503"));
        let combinator = PrioritizedCombinator::new(vec![slow, down]).unwrap();

        let budget = Budget::within(Duration::from_secs(1));
        let err = combinator.request(&key, &Requirement::new(), Some(budget)).await.unwrap_err();
        assert_eq!(err, CombinatorError::AllSourcesFailed { key, attempted: 2 });
    }

    #[test]
    fn test_requires_sources() {
        assert!(matches!(
            PrioritizedCombinator::new(Vec::new()),
            Err(CombinatorError::NoSources { combinator: "prioritized" })
        ));
    }
}
