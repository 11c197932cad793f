//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CombinatorConfig (validated, immutable)
//!     → registry::build_source turns [root] into a combinator tree
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, CombinatorConfig, ObservabilityConfig, RetryConfig, SourceSpec, StaticSourceConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
