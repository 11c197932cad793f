//! Per-source declared coverage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{ChainId, RequestKey};

/// How reliably a declared field is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSupport {
    /// Always part of a successful response.
    Present,
    /// Returned when the provider has it.
    Optional,
}

/// Set of declared fields with their support level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet {
    fields: BTreeMap<String, FieldSupport>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field set where every name is `Present`.
    pub fn present<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names
                .into_iter()
                .map(|name| (name.into(), FieldSupport::Present))
                .collect(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, support: FieldSupport) -> Self {
        self.fields.insert(field.into(), support);
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn support(&self, field: &str) -> Option<FieldSupport> {
        self.fields.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Merge another declaration in. `Present` wins over `Optional`.
    pub fn merge(&mut self, other: &FieldSet) {
        for (name, support) in &other.fields {
            self.fields
                .entry(name.clone())
                .and_modify(|current| {
                    if *support == FieldSupport::Present {
                        *current = FieldSupport::Present;
                    }
                })
                .or_insert(*support);
        }
    }
}

/// Declared coverage of one source, per chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityMatrix {
    chains: BTreeMap<ChainId, FieldSet>,
}

impl CapabilityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, chain_id: impl Into<ChainId>, fields: FieldSet) -> Self {
        self.declare(chain_id.into(), &fields);
        self
    }

    /// Add fields for a chain, merging with anything already declared.
    pub fn declare(&mut self, chain_id: ChainId, fields: &FieldSet) {
        self.chains.entry(chain_id).or_default().merge(fields);
    }

    /// Fields this source may return for `key`; empty when the chain is not covered.
    pub fn supports(&self, key: &RequestKey) -> FieldSet {
        self.chains.get(&key.chain_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_unknown_chain_is_empty() {
        let matrix = CapabilityMatrix::new().with_chain(1, FieldSet::present(["standard", "fast"]));
        assert_eq!(matrix.supports(&RequestKey::chain(1)).len(), 2);
        assert!(matrix.supports(&RequestKey::chain(137)).is_empty());
    }

    #[test]
    fn test_merge_present_wins() {
        let mut set = FieldSet::new().with("instant", FieldSupport::Optional);
        set.merge(&FieldSet::present(["instant", "fast"]));
        set.merge(&FieldSet::new().with("fast", FieldSupport::Optional));

        assert_eq!(set.support("instant"), Some(FieldSupport::Present));
        assert_eq!(set.support("fast"), Some(FieldSupport::Present));
        assert_eq!(set.len(), 2);
    }
}
