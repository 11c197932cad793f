//! Concurrent settle-all execution.

use std::future::Future;

use futures_util::future::join_all;

use crate::source::CombinatorResult;

/// A fulfilled result tagged with the source that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled<T> {
    pub source: String,
    pub value: T,
}

/// Run every call to completion and keep the fulfilled ones, in input order.
///
/// Rejections are dropped here; callers decide whether too few successes
/// is fatal.
pub async fn settle_all<I, F, T>(calls: I) -> Vec<Settled<T>>
where
    I: IntoIterator<Item = (String, F)>,
    F: Future<Output = CombinatorResult<T>>,
{
    let outcomes = join_all(
        calls
            .into_iter()
            .map(|(source, call)| async move { (source, call.await) }),
    )
    .await;

    outcomes
        .into_iter()
        .filter_map(|(source, outcome)| match outcome {
            Ok(value) => Some(Settled { source, value }),
            Err(e) => {
                tracing::debug!(source = %source, error = %e, "Dropping rejected call");
                None
            }
        })
        .collect()
}
