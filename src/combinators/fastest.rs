//! Fastest combinator: first valid answer among concurrent calls.

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::capability::{did_satisfy, FieldSet, Requirement};
use crate::combinators::support::{call_source, combined_capability, composite_id, eligible, finish, non_empty};
use crate::model::{RequestKey, Response};
use crate::resilience::{Budget, TimeoutGuard};
use crate::source::{CombinatorError, CombinatorResult, Source, SourceRef};

/// Races every matching source and returns the fastest *valid* response.
///
/// Calls still in flight when a winner arrives are dropped, which
/// cancels their I/O.
#[derive(Debug)]
pub struct FastestCombinator {
    id: String,
    sources: Vec<SourceRef>,
}

impl FastestCombinator {
    pub fn new(sources: Vec<SourceRef>) -> CombinatorResult<Self> {
        let sources = non_empty(sources, "fastest")?;
        Ok(Self {
            id: composite_id("fastest", &sources),
            sources,
        })
    }

    async fn race(
        &self,
        key: &RequestKey,
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<Response> {
        let candidates = eligible(&self.sources, key, requirement)?;
        let guard = TimeoutGuard::new(budget);

        let mut in_flight: FuturesUnordered<_> = candidates
            .iter()
            .copied()
            .map(|source| async move {
                let outcome = call_source(source, key, requirement, &guard).await;
                (source.id(), outcome)
            })
            .collect();

        while let Some((source_id, outcome)) = in_flight.next().await {
            match outcome {
                Ok(response) if did_satisfy(&response, requirement) => {
                    tracing::debug!(source = %source_id, key = %key, pending = in_flight.len(), "Fastest valid response");
                    return Ok(response);
                }
                Ok(_) => {
                    tracing::debug!(source = %source_id, key = %key, "Skipping response that missed required fields");
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
impl Source for FastestCombinator {
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
        finish("fastest", self.race(key, requirement, budget).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityMatrix;
    use crate::source::StaticSource;
    use std::sync::Arc;
    use std::time::Duration;

    fn speeds(price: u64, with_fast: bool) -> Response {
        let mut response = Response::new().with("standard", Response::new().with("gasPrice", price));
        if with_fast {
            response.insert("fast", Response::new().with("gasPrice", price + 1));
        }
        response
    }

    fn timed(id: &str, latency_ms: u64, response: Response) -> Arc<StaticSource> {
        Arc::new(
            StaticSource::new(id)
                .respond(RequestKey::chain(1), response)
                .with_latency(Duration::from_millis(latency_ms))
                .declaring(CapabilityMatrix::new().with_chain(1, FieldSet::present(["standard", "fast"]))),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_fastest_raw_response() {
        let combinator = FastestCombinator::new(vec![
            timed("slow", 300, speeds(30, true)),
            timed("quick", 50, speeds(10, true)),
        ])
        .unwrap();

        let response = combinator.request(&RequestKey::chain(1), &Requirement::new(), None).await.unwrap();
        assert_eq!(response, speeds(10, true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_candidates_failing() {
        let key = RequestKey::chain(1);
        let combinator = FastestCombinator::new(vec![
            timed("a", 10, speeds(1, false)),
            Arc::new(StaticSource::new("b").respond(key.clone(), speeds(2, true)).failing("HTTP 429")),
        ])
        .unwrap();

        let err = combinator
            .request(&key, &Requirement::new().require("fast"), None)
            .await
            .unwrap_err();
        assert_eq!(err, CombinatorError::AllSourcesFailed { key, attempted: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_wait_for_stragglers() {
        let combinator = FastestCombinator::new(vec![
            timed("quick", 20, speeds(5, true)),
            timed("stuck", 60_000, speeds(6, true)),
        ])
        .unwrap();

        let started = tokio::time::Instant::now();
        combinator.request(&RequestKey::chain(1), &Requirement::new(), None).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
