//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check deployer names are usable as edge identifiers and unique
//! - Check URL templates and the platform API URL parse
//! - Warn about suspicious but permitted priority weights
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::EdgeConfig;
use crate::routing::deployer::{TemplateError, UrlTemplate};
use crate::routing::is_identifier;
use crate::routing::weights::resolve_weights;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one deployer is required")]
    NoDeployers,

    #[error("deployer #{0} has an empty name")]
    EmptyName(usize),

    #[error("deployer name '{0}' must start with a letter and contain only letters, digits or '_'")]
    InvalidName(String),

    #[error("deployer name '{0}' is used more than once (names are compared case-insensitively)")]
    DuplicateName(String),

    #[error("deployer '{0}' has an empty host")]
    EmptyHost(String),

    #[error("deployer '{deployer}' has an invalid url_template: {source}")]
    InvalidTemplate {
        deployer: String,
        #[source]
        source: TemplateError,
    },

    #[error("gateway.api_url '{0}' is not a valid base URL")]
    InvalidApiUrl(String),

    #[error("gateway.version_lock_header must not be empty")]
    EmptyLockHeader,
}

/// Validate a parsed configuration, returning every problem found.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.deployers.is_empty() {
        errors.push(ValidationError::NoDeployers);
    }

    let mut seen = HashSet::new();
    for (i, d) in config.deployers.iter().enumerate() {
        if d.name.is_empty() {
            errors.push(ValidationError::EmptyName(i));
        } else if !is_identifier(&d.name) {
            errors.push(ValidationError::InvalidName(d.name.clone()));
        } else if !seen.insert(d.name.to_lowercase()) {
            errors.push(ValidationError::DuplicateName(d.name.clone()));
        }

        if d.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost(d.name.clone()));
        }

        if let Err(source) = UrlTemplate::parse(&d.url_template) {
            errors.push(ValidationError::InvalidTemplate {
                deployer: d.name.clone(),
                source,
            });
        }
    }

    match Url::parse(&config.gateway.api_url) {
        Ok(url) if !url.cannot_be_a_base() => {}
        _ => errors.push(ValidationError::InvalidApiUrl(config.gateway.api_url.clone())),
    }

    if config.gateway.version_lock_header.trim().is_empty() {
        errors.push(ValidationError::EmptyLockHeader);
    }

    if errors.is_empty() {
        warn_on_priorities(config);
        Ok(())
    } else {
        Err(errors)
    }
}

/// Priority weights are deliberately unvalidated; surface oddities in logs.
fn warn_on_priorities(config: &EdgeConfig) {
    for (key, weight) in config.priorities.iter() {
        if !config.deployers.iter().any(|d| d.name.to_lowercase() == key) {
            tracing::warn!(key, "Priority entry matches no deployer and is ignored");
        }
        if weight > 100 {
            tracing::warn!(key, weight, "Priority weight exceeds 100");
        } else if weight < 0 {
            tracing::warn!(key, weight, "Priority weight is negative");
        }
    }

    let deployers: Vec<_> = config
        .deployers
        .iter()
        .filter_map(|d| crate::routing::Deployer::try_from(d).ok())
        .collect();
    let total = resolve_weights(&deployers, &config.priorities).total();
    if !config.priorities.is_empty() && total != 100 {
        tracing::warn!(total, "Resolved weights do not sum to 100; traffic split is skewed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DeployerConfig;

    fn deployer(name: &str) -> DeployerConfig {
        DeployerConfig {
            name: name.into(),
            host: format!("{}.example.com", name.to_lowercase()),
            base_path: String::new(),
            url_template: "/{package}/{action}{rest}".into(),
            fallback_logic: None,
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = EdgeConfig::default();
        config.deployers = vec![deployer("Blue"), deployer("green_2")];
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_empty_config() {
        let config = EdgeConfig::default();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoDeployers]));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = EdgeConfig::default();
        let mut bad_template = deployer("C");
        bad_template.url_template = "/{oops}".into();
        let mut no_host = deployer("D");
        no_host.host = " ".into();
        config.deployers = vec![
            deployer("A"),
            deployer("a"),
            deployer("has-dash"),
            deployer(""),
            bad_template,
            no_host,
        ];
        config.gateway.api_url = "not a url".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicateName("a".into()),
                ValidationError::InvalidName("has-dash".into()),
                ValidationError::EmptyName(3),
                ValidationError::InvalidTemplate {
                    deployer: "C".into(),
                    source: TemplateError::UnknownPlaceholder("oops".into()),
                },
                ValidationError::EmptyHost("D".into()),
                ValidationError::InvalidApiUrl("not a url".into()),
            ]
        );
    }

    #[test]
    fn test_out_of_range_priorities_are_permitted() {
        let mut config = EdgeConfig::default();
        config.deployers = vec![deployer("A"), deployer("B")];
        config.priorities.insert("a", 250);
        config.priorities.insert("ghost", 10);
        assert_eq!(validate_config(&config), Ok(()));
    }
}
