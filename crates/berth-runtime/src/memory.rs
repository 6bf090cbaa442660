//! In-process container engine.
//!
//! Behaves like the real engine where the control plane depends on it:
//! start and stop are not idempotent, running containers cannot be
//! removed, and creation requires the image to be present. Every call is
//! journaled so callers can assert on ordering.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use berth_common::error::{BerthError, Result};
use berth_common::types::{
    ContainerId, ContainerStatus, ContainerSummary, Image, ImageId, UNTAGGED,
};
use chrono::{DateTime, Utc};

use crate::client::{ContainerDetail, CreateSpec, RuntimeClient};
use crate::metrics::RawStats;

/// One call made against the in-memory engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    /// `list_containers`.
    List,
    /// `inspect_container`.
    Inspect(String),
    /// `start_container`.
    Start(String),
    /// `stop_container`.
    Stop(String),
    /// `remove_container`.
    Remove(String),
    /// `create_container`, with the image reference.
    Create(String),
    /// `image_present`.
    ImagePresent(String),
    /// `pull_image`.
    Pull(String),
    /// `remove_image`.
    RemoveImage(String),
}

#[derive(Debug, Clone)]
struct StoredContainer {
    id: ContainerId,
    name: String,
    spec: CreateSpec,
    status: ContainerStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredImage {
    id: ImageId,
    reference: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    containers: BTreeMap<String, StoredContainer>,
    images: Vec<StoredImage>,
    failing_pulls: HashSet<String>,
    stats: HashMap<String, RawStats>,
    logs: HashMap<String, Vec<String>>,
    calls: Vec<RuntimeCall>,
}

impl Inner {
    fn resolve(&self, id: &str) -> Result<String> {
        self.containers
            .values()
            .find(|c| c.id.as_str().starts_with(id) || c.name == id)
            .map(|c| c.id.as_str().to_string())
            .ok_or_else(|| BerthError::NotFound {
                kind: "container",
                id: id.to_string(),
            })
    }

    fn container_mut(&mut self, id: &str) -> Result<&mut StoredContainer> {
        let full = self.resolve(id)?;
        self.containers
            .get_mut(&full)
            .ok_or_else(|| BerthError::NotFound {
                kind: "container",
                id: id.to_string(),
            })
    }

    fn has_image(&self, reference: &str) -> bool {
        if reference.is_empty() {
            return false;
        }
        let wanted = with_default_tag(reference);
        let raw = reference.trim_start_matches("sha256:");
        self.images.iter().any(|i| {
            i.reference == wanted || i.id.as_str().trim_start_matches("sha256:").starts_with(raw)
        })
    }
}

fn with_default_tag(reference: &str) -> String {
    let (repo, tag) = crate::docker::split_reference(reference);
    if reference.contains('@') {
        format!("{repo}@{tag}")
    } else {
        format!("{repo}:{tag}")
    }
}

fn generate_id() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// An engine that lives entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    inner: Mutex<Inner>,
}

impl InMemoryRuntime {
    /// Creates an empty engine with no images or containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes an image reference locally present.
    pub fn add_image(&self, reference: &str, size_bytes: u64) -> ImageId {
        let id = ImageId::new(format!("sha256:{}", generate_id()));
        self.lock().images.push(StoredImage {
            id: id.clone(),
            reference: with_default_tag(reference),
            size_bytes,
            created_at: Utc::now(),
        });
        id
    }

    /// Adds a container in the given state, making its image present.
    pub fn add_container(&self, name: &str, image: &str, status: ContainerStatus) -> ContainerId {
        if !self.lock().has_image(image) {
            let _ = self.add_image(image, 0);
        }
        let id = ContainerId::new(generate_id());
        let _ = self.lock().containers.insert(
            id.as_str().to_string(),
            StoredContainer {
                id: id.clone(),
                name: name.to_string(),
                spec: CreateSpec {
                    image: image.to_string(),
                    name: Some(name.to_string()),
                    ..CreateSpec::default()
                },
                status,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Makes every subsequent pull of `reference` fail.
    pub fn fail_pulls_of(&self, reference: &str) {
        let _ = self.lock().failing_pulls.insert(with_default_tag(reference));
    }

    /// Sets the sample returned by `fetch_raw_stats` for a container.
    pub fn set_stats(&self, id: &ContainerId, stats: RawStats) {
        let _ = self.lock().stats.insert(id.as_str().to_string(), stats);
    }

    /// Sets the log lines returned for a container.
    pub fn set_logs(&self, id: &ContainerId, lines: Vec<String>) {
        let _ = self.lock().logs.insert(id.as_str().to_string(), lines);
    }

    /// Returns the journal of calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.clone()
    }

    /// Returns the current status of a container, if it exists.
    #[must_use]
    pub fn status_of(&self, id: &ContainerId) -> Option<ContainerStatus> {
        let inner = self.lock();
        let full = inner.resolve(id.as_str()).ok()?;
        inner.containers.get(&full).map(|c| c.status)
    }

    /// Returns the number of containers the engine holds.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }
}

#[async_trait]
impl RuntimeClient for InMemoryRuntime {
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerSummary>> {
        let mut inner = self.lock();
        inner.calls.push(RuntimeCall::List);
        Ok(inner
            .containers
            .values()
            .filter(|c| include_stopped || c.status.is_running())
            .map(|c| ContainerSummary {
                id: c.id.short(),
                name: c.name.clone(),
                image: c.spec.image.clone(),
                status: c.status,
                ports: c.spec.ports.clone(),
                created_at: c.created_at,
            })
            .collect())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetail> {
        let mut inner = self.lock();
        inner.calls.push(RuntimeCall::Inspect(id.to_string()));
        let c = inner.container_mut(id.as_str())?;
        Ok(ContainerDetail {
            id: c.id.clone(),
            name: c.name.clone(),
            image: c.spec.image.clone(),
            status: c.status,
            running: c.status.is_running(),
            created_at: c.created_at,
        })
    }

    async fn start_container(&self, id: &ContainerId) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(RuntimeCall::Start(id.to_string()));
        let c = inner.container_mut(id.as_str())?;
        if c.status.is_running() {
            return Err(BerthError::conflict(format!(
                "container {id} is already in the requested state"
            )));
        }
        c.status = ContainerStatus::Running;
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(RuntimeCall::Stop(id.to_string()));
        let c = inner.container_mut(id.as_str())?;
        if !c.status.is_running() {
            return Err(BerthError::conflict(format!(
                "container {id} is already in the requested state"
            )));
        }
        c.status = ContainerStatus::Stopped;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(RuntimeCall::Remove(id.to_string()));
        let full = inner.resolve(id.as_str())?;
        if inner.containers.get(&full).is_some_and(|c| c.status.is_running()) {
            return Err(BerthError::conflict(format!(
                "cannot remove running container {id}"
            )));
        }
        let _ = inner.containers.remove(&full);
        let _ = inner.stats.remove(&full);
        let _ = inner.logs.remove(&full);
        Ok(())
    }

    async fn create_container(&self, spec: &CreateSpec) -> Result<ContainerId> {
        let mut inner = self.lock();
        inner.calls.push(RuntimeCall::Create(spec.image.clone()));
        if !inner.has_image(&spec.image) {
            return Err(BerthError::NotFound {
                kind: "image",
                id: spec.image.clone(),
            });
        }
        let id = ContainerId::new(generate_id());
        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("berth_{}", id.short()));
        if inner.containers.values().any(|c| c.name == name) {
            return Err(BerthError::conflict(format!(
                "container name {name} is already in use"
            )));
        }
        let _ = inner.containers.insert(
            id.as_str().to_string(),
            StoredContainer {
                id: id.clone(),
                name,
                spec: spec.clone(),
                status: ContainerStatus::Created,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn image_present(&self, reference: &str) -> Result<bool> {
        let mut inner = self.lock();
        inner.calls.push(RuntimeCall::ImagePresent(reference.to_string()));
        Ok(inner.has_image(reference))
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        let failing = {
            let mut inner = self.lock();
            inner.calls.push(RuntimeCall::Pull(reference.to_string()));
            inner.failing_pulls.contains(&with_default_tag(reference))
        };
        if failing {
            return Err(BerthError::runtime(format!(
                "pull access denied for {reference}"
            )));
        }
        let _ = self.add_image(reference, 0);
        Ok(())
    }

    async fn fetch_raw_stats(&self, id: &ContainerId) -> Result<RawStats> {
        let inner = self.lock();
        let full = inner.resolve(id.as_str())?;
        Ok(inner.stats.get(&full).copied().unwrap_or_default())
    }

    async fn fetch_logs(&self, id: &ContainerId, tail: usize) -> Result<Vec<String>> {
        let inner = self.lock();
        let full = inner.resolve(id.as_str())?;
        let lines = inner.logs.get(&full).cloned().unwrap_or_default();
        let skip = lines.len().saturating_sub(tail);
        Ok(lines.into_iter().skip(skip).collect())
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let inner = self.lock();
        Ok(inner
            .images
            .iter()
            .map(|i| Image {
                id: i.id.short(),
                tags: if i.reference.is_empty() {
                    vec![UNTAGGED.to_string()]
                } else {
                    vec![i.reference.clone()]
                },
                size_bytes: i.size_bytes,
                created_at: i.created_at,
            })
            .collect())
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(RuntimeCall::RemoveImage(id.to_string()));
        let raw = id.as_str().trim_start_matches("sha256:");
        let wanted = with_default_tag(id.as_str());
        let position = inner
            .images
            .iter()
            .position(|i| {
                i.id.as_str().trim_start_matches("sha256:").starts_with(raw)
                    || i.reference == wanted
            })
            .ok_or_else(|| BerthError::NotFound {
                kind: "image",
                id: id.to_string(),
            })?;
        let reference = inner.images[position].reference.clone();
        let in_use = inner.containers.values().any(|c| with_default_tag(&c.spec.image) == reference);
        if in_use && !force {
            return Err(BerthError::conflict(format!(
                "image {id} is referenced by a container"
            )));
        }
        let _ = inner.images.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_twice_is_a_conflict() {
        let rt = InMemoryRuntime::new();
        let id = rt.add_container("web", "nginx", ContainerStatus::Stopped);
        rt.start_container(&id).await.expect("first start");
        let err = rt.start_container(&id).await.unwrap_err();
        assert!(matches!(err, BerthError::Conflict { .. }));
    }

    #[tokio::test]
    async fn running_container_cannot_be_removed() {
        let rt = InMemoryRuntime::new();
        let id = rt.add_container("web", "nginx", ContainerStatus::Running);
        let err = rt.remove_container(&id).await.unwrap_err();
        assert!(matches!(err, BerthError::Conflict { .. }));
        assert_eq!(rt.container_count(), 1);
    }

    #[tokio::test]
    async fn short_ids_and_names_resolve() {
        let rt = InMemoryRuntime::new();
        let id = rt.add_container("web", "nginx", ContainerStatus::Running);
        let by_short = rt.inspect_container(&id.short()).await.expect("short id");
        assert_eq!(by_short.id, id);
        let by_name = rt.inspect_container(&ContainerId::new("web")).await.expect("name");
        assert_eq!(by_name.id, id);
    }

    #[tokio::test]
    async fn create_requires_present_image() {
        let rt = InMemoryRuntime::new();
        let spec = CreateSpec {
            image: "redis:7".into(),
            ..CreateSpec::default()
        };
        assert!(rt.create_container(&spec).await.is_err());
        rt.pull_image("redis:7").await.expect("pull");
        assert!(rt.image_present("redis:7").await.expect("present"));
        let id = rt.create_container(&spec).await.expect("create");
        assert_eq!(rt.status_of(&id), Some(ContainerStatus::Created));
    }

    #[tokio::test]
    async fn untagged_reference_means_latest() {
        let rt = InMemoryRuntime::new();
        let _ = rt.add_image("nginx", 10);
        assert!(rt.image_present("nginx:latest").await.expect("present"));
        assert!(!rt.image_present("nginx:1.27").await.expect("absent"));
    }

    #[tokio::test]
    async fn logs_are_tailed() {
        let rt = InMemoryRuntime::new();
        let id = rt.add_container("web", "nginx", ContainerStatus::Running);
        rt.set_logs(&id, (1..=5).map(|i| format!("line {i}")).collect());
        let lines = rt.fetch_logs(&id, 2).await.expect("logs");
        assert_eq!(lines, vec!["line 4", "line 5"]);
    }

    #[tokio::test]
    async fn referenced_image_needs_force() {
        let rt = InMemoryRuntime::new();
        let image = rt.add_image("nginx", 10);
        let _ = rt.add_container("web", "nginx", ContainerStatus::Stopped);
        assert!(rt.remove_image(&image, false).await.is_err());
        rt.remove_image(&image, true).await.expect("forced removal");
        assert!(rt.list_images().await.expect("list").is_empty());
    }
}
