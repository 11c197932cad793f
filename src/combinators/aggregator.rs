//! Aggregator combinator: one answer computed from many gas price sources.
//!
//! # Pipeline
//! ```text
//! eligible sources (capability filter)
//!     → concurrent guarded calls, settle all
//!     → drop responses that miss required fields
//!     → richest cohort: keep responses whose speed set equals the largest one
//!     → one shape only: fee-market (maxFeePerGas + maxPriorityFeePerGas) or legacy (gasPrice)
//!     → per speed, pick by method on the compared field
//! ```
//!
//! `Mean` keeps its historical meaning: it is a lower-median pick, not an
//! arithmetic mean. Callers depend on it returning one of the observed
//! responses.

use std::collections::{BTreeMap, BTreeSet};

use alloy::primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::{did_satisfy, FieldSet, Requirement};
use crate::combinators::support::{call_source, combined_capability, composite_id, eligible, finish, non_empty};
use crate::model::{FieldValue, RequestKey, Response};
use crate::resilience::{settle_all, Budget, Settled, TimeoutGuard};
use crate::source::{CombinatorError, CombinatorResult, Source, SourceRef};

pub const GAS_PRICE: &str = "gasPrice";
pub const MAX_FEE_PER_GAS: &str = "maxFeePerGas";
pub const MAX_PRIORITY_FEE_PER_GAS: &str = "maxPriorityFeePerGas";

/// How responses within one speed are reduced to a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    /// Lower-median pick of the sorted responses.
    Mean,
    /// Middle response; even counts average the two central responses.
    Median,
    Min,
    Max,
}

/// The two incompatible gas price shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    FeeMarket,
    Legacy,
}

impl Shape {
    fn compared_field(self) -> &'static str {
        match self {
            Shape::FeeMarket => MAX_FEE_PER_GAS,
            Shape::Legacy => GAS_PRICE,
        }
    }

    fn of_group(group: &Response) -> Option<Shape> {
        if group.amount(MAX_FEE_PER_GAS).is_some() && group.amount(MAX_PRIORITY_FEE_PER_GAS).is_some() {
            Some(Shape::FeeMarket)
        } else if group.amount(GAS_PRICE).is_some() {
            Some(Shape::Legacy)
        } else {
            None
        }
    }

    /// Shape shared by every category of the response, if any.
    fn of_response(response: &Response) -> Option<Shape> {
        let mut shapes = categories(response).into_iter().map(|(_, group)| Shape::of_group(group));
        let first = shapes.next().flatten()?;
        shapes.all(|shape| shape == Some(first)).then_some(first)
    }
}

/// Aggregates concurrent responses per speed.
#[derive(Debug)]
pub struct AggregatorCombinator {
    id: String,
    sources: Vec<SourceRef>,
    method: AggregationMethod,
}

impl AggregatorCombinator {
    pub fn new(sources: Vec<SourceRef>, method: AggregationMethod) -> CombinatorResult<Self> {
        let sources = non_empty(sources, "aggregate")?;
        Ok(Self {
            id: composite_id("aggregate", &sources),
            sources,
            method,
        })
    }

    async fn aggregate(
        &self,
        key: &RequestKey,
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<Response> {
        let candidates = eligible(&self.sources, key, requirement)?;
        let guard = TimeoutGuard::new(budget);

        let settled = settle_all(candidates.iter().copied().map(|source| {
            (
                source.id().to_string(),
                call_source(source, key, requirement, &guard),
            )
        }))
        .await;
        if settled.is_empty() {
            return Err(CombinatorError::AllSourcesFailed {
                key: key.clone(),
                attempted: candidates.len(),
            });
        }

        let received = settled.len();
        let valid: Vec<Settled<Response>> = settled
            .into_iter()
            .filter(|settled| did_satisfy(&settled.value, requirement))
            .collect();
        if valid.is_empty() {
            return Err(CombinatorError::NoValidResponses {
                key: key.clone(),
                received,
            });
        }

        let cohort = richest_cohort(valid);
        let Some((shape, responses)) = partition_by_shape(cohort) else {
            return Err(CombinatorError::NoValidResponses {
                key: key.clone(),
                received,
            });
        };

        tracing::debug!(
            key = %key,
            received,
            aggregated = responses.len(),
            method = ?self.method,
            shape = ?shape,
            "Aggregating responses"
        );
        Ok(combine(shape, &responses, self.method))
    }
}

#[async_trait]
impl Source for AggregatorCombinator {
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
        finish("aggregate", self.aggregate(key, requirement, budget).await)
    }
}

/// Category name → group. A response without groups is one unnamed category.
fn categories(response: &Response) -> Vec<(Option<&str>, &Response)> {
    let groups: Vec<(Option<&str>, &Response)> = response
        .groups()
        .map(|(name, group)| (Some(name), group))
        .collect();
    if groups.is_empty() {
        vec![(None, response)]
    } else {
        groups
    }
}

fn signature(response: &Response) -> BTreeSet<String> {
    response.groups().map(|(name, _)| name.to_string()).collect()
}

/// Keep only responses whose category set equals the richest one.
///
/// Ties on size go to the first signature seen in source order.
fn richest_cohort(responses: Vec<Settled<Response>>) -> Vec<Settled<Response>> {
    let mut richest: Option<BTreeSet<String>> = None;
    for settled in &responses {
        let candidate = signature(&settled.value);
        if richest.as_ref().map_or(true, |best| candidate.len() > best.len()) {
            richest = Some(candidate);
        }
    }
    let richest = richest.unwrap_or_default();

    responses
        .into_iter()
        .filter(|settled| {
            let keep = signature(&settled.value) == richest;
            if !keep {
                tracing::debug!(source = %settled.source, "Dropping response outside the richest cohort");
            }
            keep
        })
        .collect()
}

/// Split by shape; fee-market responses win when both shapes occur.
fn partition_by_shape(cohort: Vec<Settled<Response>>) -> Option<(Shape, Vec<Response>)> {
    let mut fee_market = Vec::new();
    let mut legacy = Vec::new();
    for settled in cohort {
        match Shape::of_response(&settled.value) {
            Some(Shape::FeeMarket) => fee_market.push(settled.value),
            Some(Shape::Legacy) => legacy.push(settled.value),
            None => {
                tracing::warn!(source = %settled.source, "Dropping response with unrecognised gas price shape");
            }
        }
    }

    if !fee_market.is_empty() {
        if !legacy.is_empty() {
            tracing::debug!(discarded = legacy.len(), "Discarding legacy responses in favour of fee-market ones");
        }
        Some((Shape::FeeMarket, fee_market))
    } else if !legacy.is_empty() {
        Some((Shape::Legacy, legacy))
    } else {
        None
    }
}

fn combine(shape: Shape, responses: &[Response], method: AggregationMethod) -> Response {
    let mut by_category: BTreeMap<Option<&str>, Vec<&Response>> = BTreeMap::new();
    for response in responses {
        for (name, group) in categories(response) {
            by_category.entry(name).or_default().push(group);
        }
    }

    let field = shape.compared_field();
    let mut combined = Response::new();
    for (name, groups) in by_category {
        let Some(picked) = pick(groups, field, method) else {
            continue;
        };
        match name {
            Some(name) => combined.insert(name, picked),
            None => return picked,
        }
    }
    combined
}

fn pick(mut groups: Vec<&Response>, field: &str, method: AggregationMethod) -> Option<Response> {
    let value = |group: &Response| group.amount(field).unwrap_or_default();

    match method {
        AggregationMethod::Max => groups
            .into_iter()
            .reduce(|best, group| if value(best) >= value(group) { best } else { group })
            .cloned(),
        AggregationMethod::Min => groups
            .into_iter()
            .reduce(|best, group| if value(best) <= value(group) { best } else { group })
            .cloned(),
        AggregationMethod::Mean => {
            groups.sort_by_key(|group| value(*group));
            let lower_middle = groups.len().checked_sub(1)? / 2;
            groups.get(lower_middle).map(|group| (*group).clone())
        }
        AggregationMethod::Median => {
            groups.sort_by_key(|group| value(*group));
            let len = groups.len();
            if len % 2 == 1 {
                groups.get(len / 2).map(|group| (*group).clone())
            } else {
                let lower = groups.get(len.checked_sub(2)? / 2)?;
                let upper = groups.get(len / 2)?;
                Some(midpoint(lower, upper))
            }
        }
    }
}

/// `lower` with every amount it shares with `upper` replaced by their floor average.
fn midpoint(lower: &Response, upper: &Response) -> Response {
    lower
        .iter()
        .map(|(name, value)| match (value, upper.get(name)) {
            (FieldValue::Amount(a), Some(FieldValue::Amount(b))) => (name, FieldValue::Amount(average(*a, *b))),
            _ => (name, value.clone()),
        })
        .collect()
}

fn average(a: U256, b: U256) -> U256 {
    (a & b) + ((a ^ b) >> 1)
}
