//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{DeployerConfig, EdgeConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::routing::deployer::{Deployer, TemplateError};

/// Environment variable overriding `gateway.service`.
pub const ENV_SERVICE: &str = "EDGE_GATEWAY_SERVICE";
/// Environment variable overriding `gateway.auth`.
pub const ENV_AUTH: &str = "EDGE_GATEWAY_AUTH";
/// Environment variable overriding `gateway.check_path`.
pub const ENV_CHECK_PATH: &str = "EDGE_GATEWAY_CHECK_PATH";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("deployer '{deployer}': {source}")]
    Template {
        deployer: String,
        #[source]
        source: TemplateError,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Secrets may come from the environment instead of the file.
pub fn load_config(path: &Path) -> Result<EdgeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parse, apply overrides from `env`, then validate.
pub fn parse_config(
    content: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<EdgeConfig, ConfigError> {
    let mut config: EdgeConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, env);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn apply_env_overrides(config: &mut EdgeConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(service) = env(ENV_SERVICE) {
        config.gateway.service = Some(service);
    }
    if let Some(auth) = env(ENV_AUTH) {
        config.gateway.auth = Some(auth);
    }
    if let Some(check_path) = env(ENV_CHECK_PATH) {
        config.gateway.check_path = Some(check_path);
    }
}

impl EdgeConfig {
    /// Build the ordered deployer list for compilation.
    pub fn build_deployers(&self) -> Result<Vec<Deployer>, ConfigError> {
        self.deployers
            .iter()
            .map(|d: &DeployerConfig| {
                Deployer::try_from(d).map_err(|source| ConfigError::Template {
                    deployer: d.name.clone(),
                    source,
                })
            })
            .collect()
    }
}
