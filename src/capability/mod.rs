//! Capability declaration and requirement matching.
//!
//! # Data Flow
//! ```text
//! Source::capability_for(key)
//!     → matrix.rs (per-chain FieldSet, Present/Optional per field)
//!     → matcher.rs could_satisfy(declared, requirement)   before any call
//!     → Source::request
//!     → matcher.rs did_satisfy(response, requirement)     after every call
//! ```
//!
//! # Design Decisions
//! - Capability is an explicit immutable value, never inferred from response shape
//! - Declared capability is an upper bound; responses are always re-validated
//! - Sources without coverage for a key are excluded before any I/O

pub mod matcher;
pub mod matrix;
pub mod requirement;

pub use matcher::{could_satisfy, did_satisfy, missing_required};
pub use matrix::{CapabilityMatrix, FieldSet, FieldSupport};
pub use requirement::{FieldRequirement, Requirement};
