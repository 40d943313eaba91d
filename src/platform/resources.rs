//! Remote resource specifications.
//!
//! Every struct serializes to the form body the platform API expects.
//! Parameters that the gateway fixes (probe cadence, TLS, timeouts) are
//! set by the `for_deployer` constructors and nowhere else.

use std::fmt;

use serde::Serialize;

use crate::routing::deployer::Deployer;

/// Name of the always-false request condition attached to every backend.
pub const FALSE_CONDITION: &str = "false";

/// Priority given to every generated snippet.
pub const SNIPPET_PRIORITY: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionKind {
    Request,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionSpec {
    pub name: String,
    pub statement: String,
    #[serde(rename = "type")]
    pub kind: ConditionKind,
}

impl ConditionSpec {
    /// A request condition that never holds. Backends reference it so the
    /// platform never auto-selects them; selection logic picks explicitly.
    pub fn always_false() -> Self {
        Self {
            name: FALSE_CONDITION.to_string(),
            statement: "false".to_string(),
            kind: ConditionKind::Request,
        }
    }
}

/// An edge lookup table (dictionary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DictionarySpec {
    pub name: String,
    pub write_only: bool,
}

impl DictionarySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            write_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckSpec {
    pub name: String,
    pub host: String,
    pub path: String,
    pub method: String,
    pub http_version: String,
    /// Milliseconds between probes.
    pub check_interval: u32,
    pub expected_response: u16,
    /// Probes considered when the service starts.
    pub initial: u32,
    /// Successful probes (of `window`) required to be healthy.
    pub threshold: u32,
    /// Milliseconds before a probe times out.
    pub timeout: u32,
    pub window: u32,
}

impl HealthCheckSpec {
    pub fn for_deployer(deployer: &Deployer, check_path: &str) -> Self {
        Self {
            name: deployer.health_check_name(),
            host: deployer.host().to_string(),
            path: format!("{}{}", deployer.base_path(), check_path),
            method: "GET".to_string(),
            http_version: "1.1".to_string(),
            check_interval: 600_000,
            expected_response: 200,
            initial: 1,
            threshold: 1,
            timeout: 5_000,
            window: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSpec {
    pub name: String,
    pub address: String,
    pub hostname: String,
    pub override_host: String,
    pub ssl_cert_hostname: String,
    pub ssl_sni_hostname: String,
    pub port: u16,
    pub use_ssl: bool,
    pub healthcheck: String,
    pub request_condition: String,
    pub shield: String,
    pub weight: u32,
    pub max_conn: u32,
    pub error_threshold: u32,
    pub connect_timeout: u32,
    pub first_byte_timeout: u32,
    pub between_bytes_timeout: u32,
}

impl BackendSpec {
    pub fn for_deployer(deployer: &Deployer) -> Self {
        let host = deployer.host().to_string();
        Self {
            name: deployer.name().to_string(),
            address: host.clone(),
            hostname: host.clone(),
            override_host: host.clone(),
            ssl_cert_hostname: host.clone(),
            ssl_sni_hostname: host,
            port: 443,
            use_ssl: true,
            healthcheck: deployer.health_check_name(),
            request_condition: FALSE_CONDITION.to_string(),
            shield: String::new(),
            weight: 100,
            max_conn: 200,
            error_threshold: 0,
            connect_timeout: 5_000,
            first_byte_timeout: 60_000,
            between_bytes_timeout: 10_000,
        }
    }
}

/// Request-processing phase a snippet is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetPhase {
    Recv,
    Miss,
    Pass,
    Fetch,
    Deliver,
}

impl fmt::Display for SnippetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnippetPhase::Recv => "recv",
            SnippetPhase::Miss => "miss",
            SnippetPhase::Pass => "pass",
            SnippetPhase::Fetch => "fetch",
            SnippetPhase::Deliver => "deliver",
        };
        f.write_str(s)
    }
}

/// A versioned (non-dynamic) logic snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnippetSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub phase: SnippetPhase,
    pub priority: u32,
    pub dynamic: u8,
    pub content: String,
}

impl SnippetSpec {
    pub fn new(name: impl Into<String>, phase: SnippetPhase, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase,
            priority: SNIPPET_PRIORITY,
            dynamic: 0,
            content: content.into(),
        }
    }
}
