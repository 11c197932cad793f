//! Responses returned by sources and combinators.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use alloy::primitives::U256;
use serde::de::{self, MapAccess, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::RequestKey;

/// A single value in a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Integer amount (wei, token units).
    Amount(#[serde(serialize_with = "serialize_amount")] U256),
    /// Non-integer number (fiat spot prices).
    Decimal(f64),
    /// Free text (token name, symbol).
    Text(String),
    /// Boolean flag.
    Flag(bool),
    /// Nested mapping, e.g. one gas speed.
    Group(Response),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_amount(&self) -> Option<U256> {
        match self {
            Self::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Response> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }
}

impl From<Response> for FieldValue {
    fn from(group: Response) -> Self {
        Self::Group(group)
    }
}

// Amounts that fit a u64 stay numeric, bigger ones become decimal strings.
fn serialize_amount<S: Serializer>(amount: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    match u64::try_from(*amount) {
        Ok(small) => serializer.serialize_u64(small),
        Err(_) => serializer.collect_str(amount),
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an amount, number, string, boolean or table")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<FieldValue, E> {
        Ok(FieldValue::Flag(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldValue, E> {
        Ok(FieldValue::Amount(U256::from(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldValue, E> {
        u64::try_from(v)
            .map(|unsigned| FieldValue::Amount(U256::from(unsigned)))
            .map_err(|_| E::invalid_value(Unexpected::Signed(v), &"a non-negative amount"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FieldValue, E> {
        Ok(FieldValue::Decimal(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldValue, E> {
        Ok(FieldValue::Text(v.to_string()))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FieldValue, A::Error> {
        let mut fields = BTreeMap::new();
        while let Some((name, value)) = map.next_entry::<String, FieldValue>()? {
            fields.insert(name, value);
        }
        Ok(FieldValue::Group(Response { fields }))
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

/// Partial mapping field → value returned for one key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response {
    fields: BTreeMap<String, FieldValue>,
}

/// Result produced by a combinator for one key.
pub type CombinedResult = Response;

/// Per-key results of a batch request.
pub type BatchResponse = BTreeMap<RequestKey, Response>;

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn amount(&self, field: &str) -> Option<U256> {
        self.get(field).and_then(FieldValue::as_amount)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> BTreeSet<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Nested groups (e.g. gas speeds), in field order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &Response)> {
        self.fields
            .iter()
            .filter_map(|(name, value)| value.as_group().map(|group| (name.as_str(), group)))
    }

    /// Merge fields from `other` that are not populated yet.
    ///
    /// Existing fields are never overwritten. `accept` filters which
    /// fields may be taken. Returns the names that were added.
    pub fn absorb<F>(&mut self, other: Response, accept: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut added = Vec::new();
        for (name, value) in other.fields {
            if !accept(&name) || self.fields.contains_key(&name) {
                continue;
            }
            added.push(name.clone());
            self.fields.insert(name, value);
        }
        added
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Response {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields = iter
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self { fields }
    }
}

impl From<U256> for FieldValue {
    fn from(amount: U256) -> Self {
        Self::Amount(amount)
    }
}

impl From<u64> for FieldValue {
    fn from(amount: u64) -> Self {
        Self::Amount(U256::from(amount))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}
