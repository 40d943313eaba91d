//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env overrides for secrets)
//!     → validation.rs (semantic checks)
//!     → EdgeConfig (validated, immutable)
//!     → deployers built, gateway readiness checked
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; every deployment re-reads it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Credentials never appear in Debug output or serialized config

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{Credentials, DeployerConfig, EdgeConfig, GatewayConfig, LogFormat, ObservabilityConfig};
