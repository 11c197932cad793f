//! Caller-specified field requirements.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Whether a field must be present in an acceptable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRequirement {
    Required,
    Optional,
}

/// Mapping field → required/optional.
///
/// An empty requirement accepts any response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requirement {
    fields: BTreeMap<String, FieldRequirement>,
}

impl Requirement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `field` as required.
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldRequirement::Required);
        self
    }

    /// Ask for `field` without requiring it.
    pub fn accept(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldRequirement::Optional);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<FieldRequirement> {
        self.fields.get(field).copied()
    }

    /// True when the field was asked for, or when nothing was asked for.
    pub fn wants(&self, field: &str) -> bool {
        self.is_empty() || self.fields.contains_key(field)
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, req)| **req == FieldRequirement::Required)
            .map(|(name, _)| name.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldRequirement)> {
        self.fields.iter().map(|(name, req)| (name.as_str(), *req))
    }
}
