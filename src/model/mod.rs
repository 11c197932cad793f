//! Request and response data model.
//!
//! # Data Flow
//! ```text
//! caller
//!     → RequestKey (chain + subject) + Requirement
//!     → Source::request
//!     → Response (partial field → value mapping)
//!     → combinator merges/aggregates into a CombinedResult
//! ```
//!
//! # Design Decisions
//! - Keys are plain values, ordered and hashable, so they can index caches and batch results
//! - Responses are ordered maps; field order never carries meaning
//! - Amounts use U256 so wei-denominated values never lose precision

pub mod key;
pub mod response;

pub use key::{ChainId, KeyParseError, RequestKey, Subject};
pub use response::{BatchResponse, CombinedResult, FieldValue, Response};
