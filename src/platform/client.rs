//! Edge platform client boundary.
//!
//! # Responsibilities
//! - Define the remote calls the deployer needs ([`EdgePlatform`])
//! - Classify remote failures (conflict, not found, everything else)
//!
//! Implementations own transport, authentication and any retry policy.

use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::platform::resources::{
    BackendSpec, ConditionSpec, DictionarySpec, HealthCheckSpec, SnippetSpec,
};

/// A mutable, not-yet-active service version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DraftVersion(pub u32);

impl fmt::Display for DraftVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors returned by edge platform calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The API answered with a non-success status.
    #[error("{resource}: API returned {status}: {message}")]
    Api {
        resource: String,
        status: u16,
        message: String,
    },

    /// The request never produced a response.
    #[error("{resource}: request failed: {source}")]
    Transport {
        resource: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered successfully but with something unusable.
    #[error("{resource}: unexpected response: {message}")]
    Protocol { resource: String, message: String },
}

impl PlatformError {
    pub fn api(resource: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        PlatformError::Api {
            resource: resource.into(),
            status,
            message: message.into(),
        }
    }

    /// Name of the remote resource the failing call addressed.
    pub fn resource(&self) -> &str {
        match self {
            PlatformError::Api { resource, .. }
            | PlatformError::Transport { resource, .. }
            | PlatformError::Protocol { resource, .. } => resource,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Api { status, .. } => Some(*status),
            PlatformError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            PlatformError::Protocol { .. } => None,
        }
    }

    /// The named resource already exists.
    pub fn is_conflict(&self) -> bool {
        match self {
            PlatformError::Api { status: 409, .. } => true,
            PlatformError::Api {
                status: 400 | 422,
                message,
                ..
            } => {
                let message = message.to_lowercase();
                message.contains("duplicate") || message.contains("already exists")
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Remote calls used to stage a gateway configuration.
///
/// Every call is independent and may fail on its own.
pub trait EdgePlatform: Send + Sync {
    /// Open a fresh draft version to stage writes into.
    fn open_draft_version(&self) -> impl Future<Output = PlatformResult<DraftVersion>> + Send;

    fn write_condition(
        &self,
        version: DraftVersion,
        spec: &ConditionSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    fn write_dictionary(
        &self,
        version: DraftVersion,
        spec: &DictionarySpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    fn write_health_check(
        &self,
        version: DraftVersion,
        spec: &HealthCheckSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    /// Create a backend; fails with a conflict when it already exists.
    fn create_backend(
        &self,
        version: DraftVersion,
        spec: &BackendSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    fn update_backend(
        &self,
        version: DraftVersion,
        spec: &BackendSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    fn write_snippet(
        &self,
        version: DraftVersion,
        spec: &SnippetSpec,
    ) -> impl Future<Output = PlatformResult<()>> + Send;

    /// Make a draft live.
    fn activate_version(&self, version: DraftVersion) -> impl Future<Output = PlatformResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_classification() {
        assert!(PlatformError::api("backend/A", 409, "Duplicate record").is_conflict());
        assert!(PlatformError::api("backend/A", 400, "Backend 'A' already exists").is_conflict());
        assert!(!PlatformError::api("backend/A", 400, "Invalid port").is_conflict());
        assert!(!PlatformError::api("backend/A", 500, "duplicate").is_conflict());
        assert!(PlatformError::api("snippet/x", 404, "Record not found").is_not_found());
    }

    #[test]
    fn test_error_names_resource() {
        let e = PlatformError::api("healthcheck/BCheck", 500, "boom");
        assert_eq!(e.resource(), "healthcheck/BCheck");
        assert_eq!(e.to_string(), "healthcheck/BCheck: API returned 500: boom");
    }
}
