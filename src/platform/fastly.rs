//! Fastly API client.
//!
//! # Responsibilities
//! - Authenticate every call with the service credential
//! - Stage writes into a cloned draft version
//! - Upsert named resources (update, or create when missing)
//! - Turn API failures into classified [`PlatformError`]s
//!
//! # Design Decisions
//! - No retries here; callers decide how to react to a failure
//! - Every call is bounded by the configured request timeout
//! - The credential is only ever placed in the `Fastly-Key` header

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::schema::{Credentials, GatewayConfig};
use crate::platform::client::{DraftVersion, EdgePlatform, PlatformError, PlatformResult};
use crate::platform::resources::{
    BackendSpec, ConditionSpec, DictionarySpec, HealthCheckSpec, SnippetSpec,
};

const AUTH_HEADER: &str = "Fastly-Key";

#[derive(Debug, Deserialize)]
struct VersionInfo {
    number: u32,
    #[serde(default)]
    active: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Fastly implementation of [`EdgePlatform`].
#[derive(Clone)]
pub struct FastlyClient {
    http: Client,
    api: Url,
    service: String,
    auth: String,
}

impl std::fmt::Debug for FastlyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastlyClient")
            .field("api", &self.api.as_str())
            .field("service", &self.service)
            .finish()
    }
}

impl FastlyClient {
    /// Create a client for a ready gateway configuration.
    ///
    /// Returns `Ok(None)` when the configuration is not ready: the gateway is
    /// inert and no deployment should be attempted.
    pub fn from_config(config: &GatewayConfig) -> PlatformResult<Option<Self>> {
        let Some(credentials) = config.credentials() else {
            return Ok(None);
        };
        Self::new(
            &credentials,
            &config.api_url,
            Duration::from_secs(config.timeout_secs),
        )
        .map(Some)
    }

    pub fn new(credentials: &Credentials, api_url: &str, timeout: Duration) -> PlatformResult<Self> {
        let api = Url::parse(api_url).map_err(|e| PlatformError::Protocol {
            resource: "api".to_string(),
            message: format!("invalid API URL '{}': {}", api_url, e),
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edge-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| PlatformError::Transport {
                resource: "api".to_string(),
                source,
            })?;

        tracing::debug!(api = %api, service = %credentials.service, "Fastly client initialized");

        Ok(Self {
            http,
            api,
            service: credentials.service.clone(),
            auth: credentials.auth.clone(),
        })
    }

    /// `{api}/service/{id}/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, resource: &str, segments: &[&str]) -> PlatformResult<Url> {
        let mut url = self.api.clone();
        url.path_segments_mut()
            .map_err(|_| PlatformError::Protocol {
                resource: resource.to_string(),
                message: format!("API URL '{}' cannot be a base", self.api),
            })?
            .pop_if_empty()
            .push("service")
            .push(&self.service)
            .extend(segments);
        Ok(url)
    }

    fn versioned(&self, resource: &str, version: DraftVersion, tail: &[&str]) -> PlatformResult<Url> {
        let number = version.to_string();
        let mut segments = vec!["version", number.as_str()];
        segments.extend_from_slice(tail);
        self.endpoint(resource, &segments)
    }

    async fn send<T: DeserializeOwned>(&self, resource: &str, request: RequestBuilder) -> PlatformResult<T> {
        let response = request
            .header(AUTH_HEADER, &self.auth)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| PlatformError::Transport {
                resource: resource.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|source| PlatformError::Transport {
                resource: resource.to_string(),
                source,
            })?;
            let message = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(ApiErrorBody { msg, detail }) => match (msg, detail) {
                    (Some(m), Some(d)) if !d.is_empty() => format!("{m}: {d}"),
                    (Some(m), _) => m,
                    (None, Some(d)) => d,
                    (None, None) => body,
                },
                Err(_) => body,
            };
            return Err(PlatformError::api(resource, status.as_u16(), message));
        }

        let body = response.bytes().await.map_err(|source| PlatformError::Transport {
            resource: resource.to_string(),
            source,
        })?;
        serde_json::from_slice(&body).map_err(|e| PlatformError::Protocol {
            resource: resource.to_string(),
            message: format!("undecodable response body: {e}"),
        })
    }

    /// Update `{kind}/{name}`; create it in the `{kind}` collection when missing.
    async fn upsert<F: Serialize + Sync>(
        &self,
        version: DraftVersion,
        kind: &str,
        name: &str,
        form: &F,
    ) -> PlatformResult<()> {
        let resource = format!("{kind}/{name}");
        let item = self.versioned(&resource, version, &[kind, name])?;

        match self
            .send::<serde_json::Value>(&resource, self.http.put(item).form(form))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(resource = %resource, version = %version, "Resource missing, creating");
                let collection = self.versioned(&resource, version, &[kind])?;
                self.send::<serde_json::Value>(&resource, self.http.post(collection).form(form))
                    .await
                    .map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}

impl EdgePlatform for FastlyClient {
    async fn open_draft_version(&self) -> PlatformResult<DraftVersion> {
        let resource = "version";
        let versions: Vec<VersionInfo> = self
            .send(resource, self.http.get(self.endpoint(resource, &["version"])?))
            .await?;

        let base = versions
            .iter()
            .find(|v| v.active)
            .or_else(|| versions.iter().max_by_key(|v| v.number))
            .ok_or_else(|| PlatformError::Protocol {
                resource: resource.to_string(),
                message: "service has no versions".to_string(),
            })?;

        let base_number = base.number.to_string();
        let clone_url = self.endpoint(resource, &["version", base_number.as_str(), "clone"])?;
        let cloned: VersionInfo = self.send(resource, self.http.put(clone_url)).await?;

        tracing::info!(from = base.number, draft = cloned.number, "Cloned service version");
        Ok(DraftVersion(cloned.number))
    }

    async fn write_condition(&self, version: DraftVersion, spec: &ConditionSpec) -> PlatformResult<()> {
        self.upsert(version, "condition", &spec.name, spec).await
    }

    async fn write_dictionary(&self, version: DraftVersion, spec: &DictionarySpec) -> PlatformResult<()> {
        self.upsert(version, "dictionary", &spec.name, spec).await
    }

    async fn write_health_check(&self, version: DraftVersion, spec: &HealthCheckSpec) -> PlatformResult<()> {
        self.upsert(version, "healthcheck", &spec.name, spec).await
    }

    async fn create_backend(&self, version: DraftVersion, spec: &BackendSpec) -> PlatformResult<()> {
        let resource = format!("backend/{}", spec.name);
        let url = self.versioned(&resource, version, &["backend"])?;
        self.send::<serde_json::Value>(&resource, self.http.post(url).form(spec))
            .await
            .map(|_| ())
    }

    async fn update_backend(&self, version: DraftVersion, spec: &BackendSpec) -> PlatformResult<()> {
        let resource = format!("backend/{}", spec.name);
        let url = self.versioned(&resource, version, &["backend", spec.name.as_str()])?;
        self.send::<serde_json::Value>(&resource, self.http.put(url).form(spec))
            .await
            .map(|_| ())
    }

    async fn write_snippet(&self, version: DraftVersion, spec: &SnippetSpec) -> PlatformResult<()> {
        self.upsert(version, "snippet", &spec.name, spec).await
    }

    async fn activate_version(&self, version: DraftVersion) -> PlatformResult<()> {
        let resource = "version";
        let url = self.versioned(resource, version, &["activate"])?;
        self.send::<serde_json::Value>(resource, self.http.put(url)).await?;
        tracing::info!(version = %version, "Activated service version");
        Ok(())
    }
}
