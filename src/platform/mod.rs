//! Edge platform integration subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig (service, credential, probe path)
//!     → readiness gate (inert when incomplete)
//!     → fastly.rs (authenticated API client)
//!     → client.rs (EdgePlatform trait used by the deployer)
//!     → resources.rs (condition, table, health check, backend, snippet specs)
//! ```
//!
//! # Security Constraints
//! - The credential comes from config or environment, never from code
//! - Never log the credential
//! - All API calls are bounded by a request timeout

pub mod client;
pub mod fastly;
pub mod resources;

pub use client::{DraftVersion, EdgePlatform, PlatformError, PlatformResult};
pub use fastly::FastlyClient;
pub use resources::{
    BackendSpec, ConditionSpec, DictionarySpec, HealthCheckSpec, SnippetPhase, SnippetSpec,
};
