//! Helpers shared by the combinators.

use std::time::Instant;

use crate::capability::{could_satisfy, missing_required, FieldSet, Requirement};
use crate::model::{BatchResponse, RequestKey, Response};
use crate::observability::metrics;
use crate::resilience::TimeoutGuard;
use crate::source::{CombinatorError, CombinatorResult, SourceRef};

/// Reject construction over an empty source list.
pub(crate) fn non_empty(
    sources: Vec<SourceRef>,
    combinator: &'static str,
) -> CombinatorResult<Vec<SourceRef>> {
    if sources.is_empty() {
        return Err(CombinatorError::NoSources { combinator });
    }
    Ok(sources)
}

/// `kind(a,b,c)` style identifier.
pub(crate) fn composite_id(kind: &str, sources: &[SourceRef]) -> String {
    let ids: Vec<&str> = sources.iter().map(|s| s.id()).collect();
    format!("{kind}({})", ids.join(","))
}

/// Union of the sources' declarations for `key`.
pub(crate) fn combined_capability(sources: &[SourceRef], key: &RequestKey) -> FieldSet {
    let mut combined = FieldSet::new();
    for source in sources {
        combined.merge(&source.capability_for(key));
    }
    combined
}

/// Sources worth contacting for `key`, in their original order.
///
/// Fails before any I/O when nothing covers the key or when a required
/// field is declared by no source at all.
pub(crate) fn eligible<'a>(
    sources: &'a [SourceRef],
    key: &RequestKey,
    requirement: &Requirement,
) -> CombinatorResult<Vec<&'a SourceRef>> {
    let declared: Vec<(&SourceRef, FieldSet)> = sources
        .iter()
        .map(|source| (source, source.capability_for(key)))
        .filter(|(_, fields)| !fields.is_empty())
        .collect();
    if declared.is_empty() {
        return Err(CombinatorError::UnsupportedKey { key: key.clone() });
    }

    let missing = missing_required(declared.iter().map(|(_, fields)| fields), requirement);
    if !missing.is_empty() {
        return Err(CombinatorError::InvalidRequirement {
            key: key.clone(),
            fields: missing,
        });
    }

    let candidates: Vec<&SourceRef> = declared
        .into_iter()
        .filter(|(_, fields)| could_satisfy(fields, requirement))
        .map(|(source, _)| source)
        .collect();
    if candidates.is_empty() {
        return Err(CombinatorError::UnsupportedKey { key: key.clone() });
    }
    Ok(candidates)
}

/// Issue one guarded request, recording its outcome.
pub(crate) async fn call_source(
    source: &SourceRef,
    key: &RequestKey,
    requirement: &Requirement,
    guard: &TimeoutGuard,
) -> CombinatorResult<Response> {
    let started = Instant::now();
    let outcome = guard
        .run(source.id(), source.request(key, requirement, guard.inner_budget()))
        .await;

    let label = match &outcome {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::record_source_call(source.id(), label, started.elapsed());
    match &outcome {
        Ok(_) => tracing::debug!(source = %source.id(), key = %key, "Source responded"),
        Err(e) => tracing::debug!(source = %source.id(), key = %key, error = %e, "Source rejected"),
    }
    outcome
}

/// Issue one guarded batch request, recording its outcome.
pub(crate) async fn call_source_batch(
    source: &SourceRef,
    keys: &[RequestKey],
    requirement: &Requirement,
    guard: &TimeoutGuard,
) -> CombinatorResult<BatchResponse> {
    let started = Instant::now();
    let outcome = guard
        .run(source.id(), source.request_batch(keys, requirement, guard.inner_budget()))
        .await;

    let label = match &outcome {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::record_source_call(source.id(), label, started.elapsed());
    match &outcome {
        Ok(batch) => tracing::debug!(source = %source.id(), keys = keys.len(), answered = batch.len(), "Source responded to batch"),
        Err(e) => tracing::debug!(source = %source.id(), keys = keys.len(), error = %e, "Source rejected batch"),
    }
    outcome
}

/// Record and pass through a combinator's final outcome.
pub(crate) fn finish<T>(combinator: &'static str, outcome: CombinatorResult<T>) -> CombinatorResult<T> {
    let label = match &outcome {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::record_combinator_outcome(combinator, label);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityMatrix, FieldSupport};
    use crate::source::StaticSource;
    use std::sync::Arc;

    fn declaring(id: &str, fields: FieldSet) -> SourceRef {
        Arc::new(StaticSource::new(id).declaring(CapabilityMatrix::new().with_chain(1, fields)))
    }

    #[test]
    fn test_eligible_filters_and_keeps_order() {
        let sources = vec![
            declaring("a", FieldSet::present(["standard"])),
            declaring("b", FieldSet::present(["standard", "fast"])),
            declaring("c", FieldSet::new().with("fast", FieldSupport::Optional).with("standard", FieldSupport::Present)),
        ];
        let requirement = Requirement::new().require("fast");

        let ids: Vec<&str> = eligible(&sources, &RequestKey::chain(1), &requirement)
            .unwrap()
            .into_iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_eligible_error_kinds() {
        let sources = vec![
            declaring("a", FieldSet::present(["name"])),
            declaring("b", FieldSet::present(["symbol"])),
        ];

        let err = eligible(&sources, &RequestKey::chain(56), &Requirement::new()).unwrap_err();
        assert!(matches!(err, CombinatorError::UnsupportedKey { .. }));

        let err = eligible(&sources, &RequestKey::chain(1), &Requirement::new().require("decimals")).unwrap_err();
        assert_eq!(
            err,
            CombinatorError::InvalidRequirement {
                key: RequestKey::chain(1),
                fields: vec!["decimals".into()],
            }
        );

        // Each field is declared somewhere, but no single source has both.
        let both = Requirement::new().require("name").require("symbol");
        let err = eligible(&sources, &RequestKey::chain(1), &both).unwrap_err();
        assert!(matches!(err, CombinatorError::UnsupportedKey { .. }));
    }

    #[test]
    fn test_combined_capability_is_union() {
        let sources = vec![
            declaring("a", FieldSet::new().with("name", FieldSupport::Optional)),
            declaring("b", FieldSet::present(["name", "symbol"])),
        ];
        let combined = combined_capability(&sources, &RequestKey::chain(1));
        assert_eq!(combined.support("name"), Some(FieldSupport::Present));
        assert!(combined.contains("symbol"));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(
            non_empty(Vec::new(), "fastest").unwrap_err(),
            CombinatorError::NoSources { combinator: "fastest" }
        );
    }
}
