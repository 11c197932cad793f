//! Fallback-merge combinator: one composite entity per key, assembled from
//! sources that each cover only part of the fields.
//!
//! # Data Flow
//! ```text
//! keys × sources → assignments (keys and wanted fields per source)
//!     → seed pending counters: key → field → sources still able to supply it
//!     → all batch calls in flight, each guarded
//!     → on success: merge first-write-wins, mark contributed fields satisfied
//!     → on every settlement: decrement the counters the source was asked about
//!     → stop when nothing is pending or every source has settled
//! ```
//!
//! # Design Decisions
//! - A failed source still consumes its counters, so unreachable
//!   contributors cannot stall the merge
//! - Calls still in flight at early exit are dropped
//! - Gaps are not errors; the call fails only if no source succeeded

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::capability::{missing_required, FieldRequirement, FieldSet, Requirement};
use crate::combinators::support::{call_source_batch, combined_capability, composite_id, finish, non_empty};
use crate::model::{BatchResponse, RequestKey, Response};
use crate::resilience::{Budget, TimeoutGuard};
use crate::source::{CombinatorError, CombinatorResult, Source, SourceRef};

/// What one source is asked for.
#[derive(Debug)]
struct Assignment<'a> {
    source: &'a SourceRef,
    keys: Vec<RequestKey>,
    wanted: BTreeMap<RequestKey, BTreeSet<String>>,
    requirement: Requirement,
}

/// Fields not yet accounted for, with the number of unsettled sources
/// that could still supply each.
#[derive(Debug, Default)]
struct PendingFields {
    needed: BTreeMap<RequestKey, BTreeMap<String, usize>>,
}

impl PendingFields {
    fn seed(assignments: &[Assignment<'_>]) -> Self {
        let mut pending = Self::default();
        for assignment in assignments {
            for (key, fields) in &assignment.wanted {
                let counters = pending.needed.entry(key.clone()).or_default();
                for field in fields {
                    *counters.entry(field.clone()).or_default() += 1;
                }
            }
        }
        pending
    }

    /// Drop `fields` of `key`; someone has supplied them.
    fn satisfy(&mut self, key: &RequestKey, fields: &[String]) {
        if let Some(counters) = self.needed.get_mut(key) {
            for field in fields {
                counters.remove(field);
            }
            if counters.is_empty() {
                self.needed.remove(key);
            }
        }
    }

    /// The assignment's source has settled; it can no longer supply anything.
    fn settle(&mut self, assignment: &Assignment<'_>) {
        for (key, fields) in &assignment.wanted {
            let Some(counters) = self.needed.get_mut(key) else {
                continue;
            };
            for field in fields {
                if let Some(count) = counters.get_mut(field) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        counters.remove(field);
                    }
                }
            }
            if counters.is_empty() {
                self.needed.remove(key);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.needed.is_empty()
    }
}

/// Merges partial contributions from many sources, per key.
#[derive(Debug)]
pub struct FallbackMergeCombinator {
    id: String,
    sources: Vec<SourceRef>,
}

impl FallbackMergeCombinator {
    pub fn new(sources: Vec<SourceRef>) -> CombinatorResult<Self> {
        let sources = non_empty(sources, "fallback")?;
        Ok(Self {
            id: composite_id("fallback", &sources),
            sources,
        })
    }

    fn assign(&self, keys: &[RequestKey], requirement: &Requirement) -> CombinatorResult<Vec<Assignment<'_>>> {
        let mut assignments = Vec::new();
        let mut declared_per_key: BTreeMap<&RequestKey, Vec<FieldSet>> = BTreeMap::new();

        for source in &self.sources {
            let mut wanted = BTreeMap::new();
            for key in keys {
                let declared = source.capability_for(key);
                let fields: BTreeSet<String> = declared
                    .names()
                    .filter(|field| requirement.wants(field))
                    .map(str::to_string)
                    .collect();
                if fields.is_empty() {
                    continue;
                }
                declared_per_key.entry(key).or_default().push(declared);
                wanted.insert(key.clone(), fields);
            }
            if wanted.is_empty() {
                continue;
            }

            let asked: BTreeSet<&str> = wanted.values().flatten().map(String::as_str).collect();
            assignments.push(Assignment {
                source,
                keys: wanted.keys().cloned().collect(),
                requirement: restrict(requirement, &asked),
                wanted,
            });
        }

        let Some(first) = keys.first() else {
            return Ok(assignments);
        };
        if assignments.is_empty() {
            return Err(CombinatorError::UnsupportedKey { key: first.clone() });
        }
        for (key, declared) in &declared_per_key {
            let missing = missing_required(declared.iter(), requirement);
            if !missing.is_empty() {
                return Err(CombinatorError::InvalidRequirement {
                    key: (*key).clone(),
                    fields: missing,
                });
            }
        }
        Ok(assignments)
    }

    async fn merge(
        &self,
        keys: &[RequestKey],
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<BatchResponse> {
        let unique: BTreeSet<&RequestKey> = keys.iter().collect();
        let keys: Vec<RequestKey> = unique.into_iter().cloned().collect();

        let assignments = self.assign(&keys, requirement)?;
        let mut merged = BatchResponse::new();
        if assignments.is_empty() {
            return Ok(merged);
        }

        let mut pending = PendingFields::seed(&assignments);
        let guard = TimeoutGuard::new(budget);
        let mut in_flight: FuturesUnordered<_> = assignments
            .iter()
            .map(|assignment| async move {
                let outcome = call_source_batch(
                    assignment.source,
                    &assignment.keys,
                    &assignment.requirement,
                    &guard,
                )
                .await;
                (assignment, outcome)
            })
            .collect();

        let mut succeeded = 0usize;
        while let Some((assignment, outcome)) = in_flight.next().await {
            if let Ok(batch) = outcome {
                succeeded += 1;
                for (key, response) in batch {
                    if !assignment.wanted.contains_key(&key) {
                        continue;
                    }
                    let contributed: Vec<String> = response
                        .field_names()
                        .into_iter()
                        .filter(|field| requirement.wants(field))
                        .map(str::to_string)
                        .collect();
                    merged
                        .entry(key.clone())
                        .or_default()
                        .absorb(response, |field| requirement.wants(field));
                    pending.satisfy(&key, &contributed);
                }
            }
            pending.settle(assignment);

            if pending.is_empty() {
                tracing::debug!(
                    keys = keys.len(),
                    unsettled = in_flight.len(),
                    "All requested fields accounted for"
                );
                break;
            }
        }

        if succeeded == 0 {
            return Err(CombinatorError::AllSourcesFailed {
                key: keys[0].clone(),
                attempted: assignments.len(),
            });
        }
        Ok(merged)
    }
}

/// `requirement` limited to `fields`. Empty stays empty.
fn restrict(requirement: &Requirement, fields: &BTreeSet<&str>) -> Requirement {
    requirement
        .fields()
        .filter(|(name, _)| fields.contains(name))
        .fold(Requirement::new(), |restricted, (name, kind)| match kind {
            FieldRequirement::Required => restricted.require(name),
            FieldRequirement::Optional => restricted.accept(name),
        })
}

#[async_trait]
impl Source for FallbackMergeCombinator {
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
        let mut batch = self
            .request_batch(std::slice::from_ref(key), requirement, budget)
            .await?;
        Ok(batch.remove(key).unwrap_or_default())
    }

    async fn request_batch(
        &self,
        keys: &[RequestKey],
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<BatchResponse> {
        finish("fallback", self.merge(keys, requirement, budget).await)
    }
}
