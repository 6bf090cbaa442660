//! Docker Engine HTTP API adapter.
//!
//! Talks to a daemon exposed on a TCP endpoint (`dockerd -H tcp://...` or a
//! socket proxy). Responses are mapped onto the shared error taxonomy:
//! 404 is `NotFound`, 409 and 304 are `Conflict`, everything else is a
//! `Runtime` error carrying the engine's message.

use std::collections::HashMap;

use async_trait::async_trait;
use berth_common::error::{BerthError, Result};
use berth_common::types::{
    ContainerId, ContainerStatus, ContainerSummary, Image, ImageId, PortMapping, Protocol,
    UNTAGGED, normalize_container_name,
};
use chrono::{DateTime, Utc};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::client::{ContainerDetail, CreateSpec, RuntimeClient};
use crate::metrics::{CounterSample, RawStats};

/// Adapter for the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerClient {
    endpoint: String,
    http: reqwest::Client,
}

impl DockerClient {
    /// Creates a client for the given base URL, e.g. `http://127.0.0.1:2375`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BerthError::Config {
                message: format!("failed to build engine HTTP client: {e}"),
            })?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| BerthError::runtime(format!("engine request failed: {e}")))
    }
}

/// Passes successful responses through and maps failures onto the
/// error taxonomy.
async fn check(response: Response, kind: &'static str, id: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(engine_error(status, &body, kind, id))
}

fn engine_error(status: StatusCode, body: &str, kind: &'static str, id: &str) -> BerthError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());
    if status == StatusCode::NOT_FOUND {
        BerthError::NotFound {
            kind,
            id: id.to_string(),
        }
    } else if status == StatusCode::NOT_MODIFIED {
        BerthError::conflict(format!("{kind} {id} is already in the requested state"))
    } else if status == StatusCode::CONFLICT {
        BerthError::conflict(message)
    } else if message.is_empty() {
        BerthError::runtime(format!("engine returned {status}"))
    } else {
        BerthError::runtime(message)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| BerthError::runtime(format!("unreadable engine response: {e}")))
}

/// Splits an image reference into repository and tag (or digest).
///
/// A colon only starts a tag when it follows the last `/`, so registry
/// ports are kept in the repository. The tag defaults to `latest`.
#[must_use]
pub fn split_reference(reference: &str) -> (&str, &str) {
    if let Some((repo, digest)) = reference.split_once('@') {
        return (repo, digest);
    }
    let name_start = reference.rfind('/').map_or(0, |i| i + 1);
    match reference[name_start..].rfind(':') {
        Some(i) => (
            &reference[..name_start + i],
            &reference[name_start + i + 1..],
        ),
        None => (reference, "latest"),
    }
}

/// Scans a pull progress stream for a reported failure.
fn pull_failure(progress: &str) -> Option<String> {
    progress
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str::<PullProgress>(l).ok())
        .find_map(|p| {
            p.error
                .or_else(|| p.error_detail.and_then(|d| d.message))
        })
}

fn create_body(spec: &CreateSpec) -> Value {
    let mut exposed = serde_json::Map::new();
    let mut bindings: HashMap<String, Vec<Value>> = HashMap::new();
    for port in &spec.ports {
        let key = port.engine_key();
        let _ = exposed.insert(key.clone(), json!({}));
        if let Some(host_port) = port.host_port {
            bindings.entry(key).or_default().push(json!({
                "HostIp": port.host_ip.clone().unwrap_or_default(),
                "HostPort": host_port.to_string(),
            }));
        }
    }
    json!({
        "Image": spec.image,
        "Env": spec.env,
        "Tty": true,
        "ExposedPorts": exposed,
        "HostConfig": { "PortBindings": bindings },
    })
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[async_trait]
impl RuntimeClient for DockerClient {
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerSummary>> {
        let request = self
            .http
            .get(self.url("/containers/json"))
            .query(&[("all", include_stopped)]);
        let response = check(self.send(request).await?, "containers", "").await?;
        let containers: Vec<EngineContainer> = read_json(response).await?;
        Ok(containers.into_iter().map(EngineContainer::into_summary).collect())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetail> {
        let request = self.http.get(self.url(&format!("/containers/{id}/json")));
        let response = check(self.send(request).await?, "container", id.as_str()).await?;
        let inspect: EngineInspect = read_json(response).await?;
        Ok(ContainerDetail {
            id: ContainerId::new(inspect.id),
            name: normalize_container_name(&inspect.name),
            image: inspect.config.image,
            status: ContainerStatus::from_engine(&inspect.state.status),
            running: inspect.state.running,
            created_at: DateTime::parse_from_rfc3339(&inspect.created)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_default(),
        })
    }

    async fn start_container(&self, id: &ContainerId) -> Result<()> {
        let request = self.http.post(self.url(&format!("/containers/{id}/start")));
        let _ = check(self.send(request).await?, "container", id.as_str()).await?;
        tracing::debug!(id = %id, "engine started container");
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId) -> Result<()> {
        let request = self.http.post(self.url(&format!("/containers/{id}/stop")));
        let _ = check(self.send(request).await?, "container", id.as_str()).await?;
        tracing::debug!(id = %id, "engine stopped container");
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<()> {
        let request = self.http.delete(self.url(&format!("/containers/{id}")));
        let _ = check(self.send(request).await?, "container", id.as_str()).await?;
        tracing::debug!(id = %id, "engine removed container");
        Ok(())
    }

    async fn create_container(&self, spec: &CreateSpec) -> Result<ContainerId> {
        let mut request = self
            .http
            .post(self.url("/containers/create"))
            .json(&create_body(spec));
        if let Some(name) = &spec.name {
            request = request.query(&[("name", name)]);
        }
        let response = check(self.send(request).await?, "image", &spec.image).await?;
        let created: CreateResponse = read_json(response).await?;
        for warning in created.warnings.unwrap_or_default() {
            tracing::warn!(image = %spec.image, warning = %warning, "engine warning on create");
        }
        Ok(ContainerId::new(created.id))
    }

    async fn image_present(&self, reference: &str) -> Result<bool> {
        let request = self.http.get(self.url(&format!("/images/{reference}/json")));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let _ = check(response, "image", reference).await?;
        Ok(true)
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        let (repository, tag) = split_reference(reference);
        tracing::info!(repository, tag, "pulling image");
        let request = self
            .http
            .post(self.url("/images/create"))
            .query(&[("fromImage", repository), ("tag", tag)]);
        let response = check(self.send(request).await?, "image", reference).await?;
        // The engine streams progress until the transfer finishes.
        let progress = response
            .text()
            .await
            .map_err(|e| BerthError::runtime(format!("pull of {reference} interrupted: {e}")))?;
        if let Some(message) = pull_failure(&progress) {
            return Err(BerthError::runtime(message));
        }
        tracing::info!(reference, "image pull complete");
        Ok(())
    }

    async fn fetch_raw_stats(&self, id: &ContainerId) -> Result<RawStats> {
        let request = self
            .http
            .get(self.url(&format!("/containers/{id}/stats")))
            .query(&[("stream", false)]);
        let response = check(self.send(request).await?, "container", id.as_str()).await?;
        let stats: EngineStats = read_json(response).await?;
        Ok(stats.into_raw())
    }

    async fn fetch_logs(&self, id: &ContainerId, tail: usize) -> Result<Vec<String>> {
        let request = self
            .http
            .get(self.url(&format!("/containers/{id}/logs")))
            .query(&[("stdout", "true"), ("stderr", "true")])
            .query(&[("tail", tail)]);
        let response = check(self.send(request).await?, "container", id.as_str()).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BerthError::runtime(format!("failed to read logs of {id}: {e}")))?;
        Ok(crate::logs::split_lines(&crate::logs::demultiplex(&bytes)))
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let request = self.http.get(self.url("/images/json"));
        let response = check(self.send(request).await?, "images", "").await?;
        let images: Vec<EngineImage> = read_json(response).await?;
        Ok(images.into_iter().map(EngineImage::into_image).collect())
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<()> {
        let request = self
            .http
            .delete(self.url(&format!("/images/{id}")))
            .query(&[("force", force)]);
        let _ = check(self.send(request).await?, "image", id.as_str()).await?;
        tracing::debug!(id = %id, force, "engine removed image");
        Ok(())
    }
}

// ── Engine wire types ───────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct PullProgress {
    error: Option<String>,
    #[serde(rename = "errorDetail")]
    error_detail: Option<PullErrorDetail>,
}

#[derive(Deserialize)]
struct PullErrorDetail {
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateResponse {
    id: String,
    warnings: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EngineContainer {
    id: String,
    #[serde(default)]
    names: Vec<String>,
    image: String,
    state: String,
    #[serde(default)]
    ports: Vec<EnginePort>,
    created: i64,
}

impl EngineContainer {
    fn into_summary(self) -> ContainerSummary {
        ContainerSummary {
            id: ContainerId::new(self.id).short(),
            name: self
                .names
                .first()
                .map(|n| normalize_container_name(n))
                .unwrap_or_default(),
            image: self.image,
            status: ContainerStatus::from_engine(&self.state),
            ports: self.ports.into_iter().map(EnginePort::into_mapping).collect(),
            created_at: timestamp(self.created),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnginePort {
    #[serde(rename = "IP")]
    ip: Option<String>,
    private_port: u16,
    public_port: Option<u16>,
    #[serde(rename = "Type")]
    kind: String,
}

impl EnginePort {
    fn into_mapping(self) -> PortMapping {
        PortMapping {
            container_port: self.private_port,
            host_port: self.public_port,
            host_ip: self.ip,
            protocol: self.kind.parse().unwrap_or(Protocol::Tcp),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EngineInspect {
    id: String,
    name: String,
    created: String,
    state: EngineState,
    config: EngineConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EngineState {
    status: String,
    running: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EngineConfig {
    image: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EngineImage {
    id: String,
    repo_tags: Option<Vec<String>>,
    size: i64,
    created: i64,
}

impl EngineImage {
    fn into_image(self) -> Image {
        let tags = match self.repo_tags {
            Some(tags) if !tags.is_empty() => tags,
            _ => vec![UNTAGGED.to_string()],
        };
        Image {
            id: ImageId::new(self.id).short(),
            tags,
            size_bytes: u64::try_from(self.size).unwrap_or(0),
            created_at: timestamp(self.created),
        }
    }
}

#[derive(Deserialize)]
struct EngineStats {
    cpu_stats: EngineCpuStats,
    precpu_stats: EngineCpuStats,
    #[serde(default)]
    memory_stats: EngineMemoryStats,
}

impl EngineStats {
    fn into_raw(self) -> RawStats {
        RawStats {
            current: self.cpu_stats.sample(),
            previous: self.precpu_stats.sample(),
            memory_used: self.memory_stats.usage.unwrap_or(0),
            memory_limit: self.memory_stats.limit.unwrap_or(0),
        }
    }
}

#[derive(Deserialize, Default)]
struct EngineCpuStats {
    #[serde(default)]
    cpu_usage: EngineCpuUsage,
    system_cpu_usage: Option<u64>,
}

impl EngineCpuStats {
    fn sample(&self) -> CounterSample {
        CounterSample {
            container_cpu: self.cpu_usage.total_usage,
            system_cpu: self.system_cpu_usage.unwrap_or(0),
        }
    }
}

#[derive(Deserialize, Default)]
struct EngineCpuUsage {
    #[serde(default)]
    total_usage: u64,
}

#[derive(Deserialize, Default)]
struct EngineMemoryStats {
    usage: Option<u64>,
    limit: Option<u64>,
}
