//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use source_combinator::capability::{CapabilityMatrix, FieldSet};
use source_combinator::{RequestKey, Response, StaticSource};

pub const MAINNET: u64 = 1;

/// Flat legacy gas response.
#[allow(dead_code)]
pub fn legacy(price: u64) -> Response {
    Response::new().with("gasPrice", price)
}

/// Legacy gas response per speed.
#[allow(dead_code)]
pub fn speeds(prices: &[(&str, u64)]) -> Response {
    prices
        .iter()
        .map(|(speed, price)| (*speed, legacy(*price)))
        .collect()
}

#[allow(dead_code)]
pub fn token(byte: u8) -> RequestKey {
    RequestKey::token(MAINNET, Address::repeat_byte(byte))
}

/// Source answering `key` with `response` after `latency_ms`.
#[allow(dead_code)]
pub fn fixture(id: &str, key: RequestKey, response: Response, latency_ms: u64) -> Arc<StaticSource> {
    Arc::new(
        StaticSource::new(id)
            .respond(key, response)
            .with_latency(Duration::from_millis(latency_ms)),
    )
}

/// Like [`fixture`], but declaring `fields` on mainnet whatever it returns.
#[allow(dead_code)]
pub fn declaring(id: &str, key: RequestKey, response: Response, latency_ms: u64, fields: &[&str]) -> Arc<StaticSource> {
    Arc::new(
        StaticSource::new(id)
            .respond(key, response)
            .with_latency(Duration::from_millis(latency_ms))
            .declaring(CapabilityMatrix::new().with_chain(MAINNET, FieldSet::present(fields.iter().copied()))),
    )
}

/// Source rejecting every call.
#[allow(dead_code)]
pub fn failing(id: &str, key: RequestKey, response: Response) -> Arc<StaticSource> {
    Arc::new(StaticSource::new(id).respond(key, response).failing("HTTP 503"))
}
