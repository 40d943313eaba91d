//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use edge_gateway::platform::{
    BackendSpec, ConditionSpec, DictionarySpec, DraftVersion, EdgePlatform, HealthCheckSpec,
    PlatformError, PlatformResult, SnippetSpec,
};
use edge_gateway::routing::{Deployer, UrlTemplate};

/// Version the mock service starts with.
pub const ACTIVE_VERSION: u32 = 1;

#[derive(Default)]
struct State {
    latest: u32,
    calls: Vec<String>,
    backends: HashMap<u32, BTreeSet<String>>,
    failures: HashMap<String, (u16, String)>,
    activated: Vec<u32>,
}

/// In-memory [`EdgePlatform`] that records every call.
///
/// Drafts are cloned from the newest version, backends included, so a
/// second deployment sees the backends of the first. Failures are injected
/// per resource (`"healthcheck/BCheck"`, `"backend/A"`, `"version"`, ...).
pub struct MockPlatform {
    state: Mutex<State>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                latest: ACTIVE_VERSION,
                ..Default::default()
            }),
        }
    }

    /// Make every call touching `resource` fail with `status`.
    pub fn fail(&self, resource: &str, status: u16, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(resource.to_string(), (status, message.to_string()));
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Calls in the order they were made, e.g. `"create backend/A"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }

    pub fn backends(&self, version: u32) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .backends
            .get(&version)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn activated(&self) -> Vec<u32> {
        self.state.lock().unwrap().activated.clone()
    }

    fn record(&self, verb: &str, resource: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{verb} {resource}"));
        match state.failures.get(resource) {
            Some((status, message)) => Err(PlatformError::api(resource, *status, message.clone())),
            None => Ok(()),
        }
    }
}

impl EdgePlatform for MockPlatform {
    async fn open_draft_version(&self) -> PlatformResult<DraftVersion> {
        self.record("open", "version")?;
        let mut state = self.state.lock().unwrap();
        let base = state.latest;
        let draft = base + 1;
        let inherited = state.backends.get(&base).cloned().unwrap_or_default();
        state.backends.insert(draft, inherited);
        state.latest = draft;
        Ok(DraftVersion(draft))
    }

    async fn write_condition(&self, _version: DraftVersion, spec: &ConditionSpec) -> PlatformResult<()> {
        self.record("write", &format!("condition/{}", spec.name))
    }

    async fn write_dictionary(&self, _version: DraftVersion, spec: &DictionarySpec) -> PlatformResult<()> {
        self.record("write", &format!("dictionary/{}", spec.name))
    }

    async fn write_health_check(&self, _version: DraftVersion, spec: &HealthCheckSpec) -> PlatformResult<()> {
        self.record("write", &format!("healthcheck/{}", spec.name))
    }

    async fn create_backend(&self, version: DraftVersion, spec: &BackendSpec) -> PlatformResult<()> {
        let resource = format!("backend/{}", spec.name);
        self.record("create", &resource)?;
        let mut state = self.state.lock().unwrap();
        let backends = state.backends.entry(version.0).or_default();
        if !backends.insert(spec.name.clone()) {
            return Err(PlatformError::api(
                resource,
                409,
                format!("Duplicate record: backend '{}' already exists", spec.name),
            ));
        }
        Ok(())
    }

    async fn update_backend(&self, version: DraftVersion, spec: &BackendSpec) -> PlatformResult<()> {
        let resource = format!("backend/{}", spec.name);
        self.record("update", &resource)?;
        let state = self.state.lock().unwrap();
        match state.backends.get(&version.0) {
            Some(b) if b.contains(&spec.name) => Ok(()),
            _ => Err(PlatformError::api(resource, 404, "Record not found")),
        }
    }

    async fn write_snippet(&self, _version: DraftVersion, spec: &SnippetSpec) -> PlatformResult<()> {
        self.record("write", &format!("snippet/{}", spec.name))
    }

    async fn activate_version(&self, version: DraftVersion) -> PlatformResult<()> {
        self.record("activate", "version")?;
        self.state.lock().unwrap().activated.push(version.0);
        Ok(())
    }
}

/// Deployer with a plain action template.
pub fn deployer(name: &str) -> Deployer {
    Deployer::new(
        name,
        format!("{}.example.net", name.to_lowercase()),
        UrlTemplate::parse("/api/v1/web/ns/{package}/{action}{atversion}{rest}").unwrap(),
    )
}

pub fn deployers(names: &[&str]) -> Vec<Deployer> {
    names.iter().map(|n| deployer(n)).collect()
}

/// One request seen by [`start_mock_api`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    /// Header names lower-cased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ApiRequest {
    /// `"PUT /service/svc/version/2/clone"`
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Start a programmable HTTP API on an ephemeral port.
///
/// `respond` maps each request to `(status, json body)`. Every request is
/// recorded in arrival order.
pub async fn start_mock_api<F>(respond: F) -> (SocketAddr, Arc<Mutex<Vec<ApiRequest>>>)
where
    F: Fn(&ApiRequest) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let log = seen.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let respond = respond.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let (status, body) = respond(&request);
                log.lock().unwrap().push(request);

                let status_text = match status {
                    200 => "200 OK".to_string(),
                    404 => "404 Not Found".to_string(),
                    409 => "409 Conflict".to_string(),
                    other => format!("{other} Error"),
                };
                write_response(&mut socket, &status_text, &body).await;
            });
        }
    });

    (addr, seen)
}

async fn write_response(socket: &mut tokio::net::TcpStream, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<ApiRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut start = lines.next()?.split_whitespace();
    let method = start.next()?.to_string();
    let path = start.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(ApiRequest {
        method,
        path,
        headers,
        body,
    })
}
