//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::routing::weights::PriorityTable;

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Remote edge platform connection settings.
    pub gateway: GatewayConfig,

    /// Backend targets, in routing order. The first one is the fallback.
    pub deployers: Vec<DeployerConfig>,

    /// Sparse weight overrides keyed by deployer name.
    pub priorities: PriorityTable,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Edge platform connection settings.
///
/// The gateway is inert until `service`, `auth` and `check_path` are all set.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Service identifier on the edge platform.
    pub service: Option<String>,

    /// API credential. Never serialized or logged.
    #[serde(skip_serializing)]
    pub auth: Option<String>,

    /// Health check path appended to each deployer's base path.
    pub check_path: Option<String>,

    /// Platform API base URL.
    pub api_url: String,

    /// Per-request timeout for platform API calls in seconds.
    pub timeout_secs: u64,

    /// Request header carrying the sticky override (`env=<name>&...`).
    pub version_lock_header: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            service: None,
            auth: None,
            check_path: None,
            api_url: "https://api.fastly.com".to_string(),
            timeout_secs: 30,
            version_lock_header: "X-OW-Version-Lock".to_string(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("service", &self.service)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .field("check_path", &self.check_path)
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("version_lock_header", &self.version_lock_header)
            .finish()
    }
}

/// Everything needed to talk to the platform, present only when ready.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub service: String,
    pub auth: String,
    pub check_path: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("service", &self.service)
            .field("auth", &"<redacted>")
            .field("check_path", &self.check_path)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl GatewayConfig {
    /// True when service, credential and probe path are all populated.
    pub fn ready(&self) -> bool {
        self.credentials().is_some()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            service: non_empty(&self.service)?.to_string(),
            auth: non_empty(&self.auth)?.to_string(),
            check_path: non_empty(&self.check_path)?.to_string(),
        })
    }
}

/// One backend target.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeployerConfig {
    /// Unique identifier (letters, digits, underscores).
    pub name: String,

    /// Upstream host name.
    pub host: String,

    /// Path prefix of the upstream.
    #[serde(default)]
    pub base_path: String,

    /// Upstream URL template, e.g. `/api/v1/web/{package}/{action}{atversion}{rest}`.
    pub url_template: String,

    /// Edge logic run when this deployer serves as the fallback.
    #[serde(default)]
    pub fallback_logic: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_readiness() {
        let mut g = GatewayConfig::default();
        assert!(!g.ready());

        g.service = Some("svc".into());
        g.auth = Some("token".into());
        assert!(!g.ready());

        g.check_path = Some("   ".into());
        assert!(!g.ready());

        g.check_path = Some("/_status".into());
        assert!(g.ready());
        assert_eq!(g.credentials().unwrap().service, "svc");
    }

    #[test]
    fn test_debug_redacts_auth() {
        let g = GatewayConfig {
            auth: Some("super-secret".into()),
            ..GatewayConfig::default()
        };
        let text = format!("{:?}", g);
        assert!(!text.contains("super-secret"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn test_parse_minimal() {
        let config: EdgeConfig = toml::from_str(
            r#"
            [[deployers]]
            name = "A"
            host = "a.example.com"
            url_template = "{rest}"

            [priorities]
            a = 80
            "#,
        )
        .unwrap();
        assert_eq!(config.deployers.len(), 1);
        assert_eq!(config.priorities.get("A"), Some(80));
        assert_eq!(config.gateway.version_lock_header, "X-OW-Version-Lock");
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }
}
