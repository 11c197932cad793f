//! Cached combinator: TTL-bound memoisation with request de-duplication.
//!
//! # Data Flow
//! ```text
//! (key, requirement) → entry lookup
//!     fresh entry  → join its shared pending call
//!     stale/absent → start the inner call, store it, join it
//! the shared call runs unbounded; each caller waits at most its own budget
//! failed inner call → entry removed if it is still the same call
//! ```
//!
//! # Design Decisions
//! - Entries hold the pending call itself, so concurrent callers share one
//!   inner request
//! - The map lock is never held across an await
//! - No caller's budget is handed to the shared call, so a short deadline
//!   cannot fail the callers that joined it
//! - Expiry is by age only; there is no explicit invalidation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::capability::{FieldSet, Requirement};
use crate::model::{RequestKey, Response};
use crate::observability::metrics;
use crate::resilience::{Budget, TimeoutGuard};
use crate::source::{CombinatorResult, Source, SourceRef};

type SharedResponse = Shared<BoxFuture<'static, CombinatorResult<Response>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    key: RequestKey,
    requirement: Requirement,
}

struct CacheEntry {
    created: Instant,
    pending: SharedResponse,
}

/// Wraps one source with a shared in-memory cache.
pub struct CachedCombinator {
    id: String,
    source: SourceRef,
    ttl: Duration,
    max_entries: Option<usize>,
    entries: DashMap<CacheKey, CacheEntry>,
}

impl std::fmt::Debug for CachedCombinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCombinator")
            .field("id", &self.id)
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl CachedCombinator {
    pub fn new(source: SourceRef, ttl: Duration, max_entries: Option<usize>) -> Self {
        Self {
            id: format!("cached({})", source.id()),
            source,
            ttl,
            max_entries,
            entries: DashMap::new(),
        }
    }

    /// Live entries, including ones that have expired but not been replaced yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn start(&self, key: &RequestKey, requirement: &Requirement) -> SharedResponse {
        let source = Arc::clone(&self.source);
        let key = key.clone();
        let requirement = requirement.clone();
        async move { source.request(&key, &requirement, None).await }
            .boxed()
            .shared()
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created) < self.ttl
    }

    /// Drop expired entries before inserting a new key. With a capacity
    /// bound this waits until the bound is reached.
    fn purge_expired(&self, now: Instant) {
        if self.max_entries.is_some_and(|max_entries| self.entries.len() < max_entries) {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
        tracing::debug!(source = %self.id, purged = before - self.entries.len(), "Purged expired cache entries");
    }

    /// Existing fresh call for the key, or a newly started one.
    fn join_or_start(&self, cache_key: CacheKey) -> (SharedResponse, bool) {
        let now = Instant::now();
        if !self.entries.contains_key(&cache_key) {
            self.purge_expired(now);
        }

        match self.entries.entry(cache_key) {
            Entry::Occupied(entry) if self.is_fresh(entry.get(), now) => (entry.get().pending.clone(), true),
            Entry::Occupied(mut entry) => {
                let pending = self.start(&entry.key().key, &entry.key().requirement);
                entry.insert(CacheEntry {
                    created: now,
                    pending: pending.clone(),
                });
                (pending, false)
            }
            Entry::Vacant(entry) => {
                let pending = self.start(&entry.key().key, &entry.key().requirement);
                entry.insert(CacheEntry {
                    created: now,
                    pending: pending.clone(),
                });
                (pending, false)
            }
        }
    }
}

#[async_trait]
impl Source for CachedCombinator {
    fn id(&self) -> &str {
        &self.id
    }

    fn capability_for(&self, key: &RequestKey) -> FieldSet {
        self.source.capability_for(key)
    }

    async fn request(
        &self,
        key: &RequestKey,
        requirement: &Requirement,
        budget: Option<Budget>,
    ) -> CombinatorResult<Response> {
        let cache_key = CacheKey {
            key: key.clone(),
            requirement: requirement.clone(),
        };
        let (pending, hit) = self.join_or_start(cache_key.clone());
        metrics::record_cache_lookup(hit);
        metrics::record_cache_size(self.entries.len());
        tracing::debug!(source = %self.id, key = %key, hit, "Cache lookup");

        let outcome = TimeoutGuard::with_margin(budget, Duration::ZERO)
            .run(&self.id, pending.clone())
            .await;

        // Only a settled failure is evicted; a caller giving up early leaves
        // the shared call running for the others.
        if matches!(pending.peek(), Some(Err(_))) {
            let removed = self
                .entries
                .remove_if(&cache_key, |_, entry| entry.pending.ptr_eq(&pending));
            if removed.is_some() {
                tracing::debug!(source = %self.id, key = %key, "Evicted failed cache entry");
            }
        }
        outcome
    }
}
