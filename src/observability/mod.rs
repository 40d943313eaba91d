//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! config, routing, gateway, platform
//!     → tracing events (structured fields: resource, version, state)
//!     → logging.rs (EnvFilter + fmt layer, pretty or JSON)
//!     → stderr
//! ```
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - JSON output for machine parsing, pretty output for terminals
//! - Credentials are never recorded as fields

pub mod logging;

pub use logging::init;
