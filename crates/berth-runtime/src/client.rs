//! Engine adapter contract.

use async_trait::async_trait;
use berth_common::error::Result;
use berth_common::types::{
    ContainerId, ContainerStatus, ContainerSummary, Image, ImageId, PortMapping,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::metrics::{CounterSample, RawStats};

/// Parameters for creating a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSpec {
    /// Image reference, e.g. `nginx:1.27`.
    pub image: String,
    /// Container name; the engine picks one when absent.
    pub name: Option<String>,
    /// Ports to expose and optionally publish.
    pub ports: Vec<PortMapping>,
    /// Environment in `KEY=value` form.
    pub env: Vec<String>,
}

/// Detailed state of a single container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDetail {
    /// Full engine identifier.
    pub id: ContainerId,
    /// Display name without the leading `/`.
    pub name: String,
    /// Image reference the container was created from.
    pub image: String,
    /// Canonical lifecycle status.
    pub status: ContainerStatus,
    /// Engine's own running flag. Also true while paused.
    pub running: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Operations the control plane consumes from a container engine.
///
/// Start and stop are not idempotent: repeating either against a container
/// already in the target state fails with a conflict. Removing a running
/// container also fails with a conflict.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Lists containers, optionally including ones that are not running.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerSummary>>;

    /// Returns the detailed state of one container.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the container does not exist.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetail>;

    /// Starts a container.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if it is already running.
    async fn start_container(&self, id: &ContainerId) -> Result<()>;

    /// Stops a container.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if it is already stopped.
    async fn stop_container(&self, id: &ContainerId) -> Result<()>;

    /// Removes a container that is not running.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the container is running.
    async fn remove_container(&self, id: &ContainerId) -> Result<()>;

    /// Creates a container from a locally present image.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the image is absent locally.
    async fn create_container(&self, spec: &CreateSpec) -> Result<ContainerId>;

    /// Returns whether an image reference is present locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    async fn image_present(&self, reference: &str) -> Result<bool>;

    /// Pulls an image and resolves once the transfer has completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer reports a failure.
    async fn pull_image(&self, reference: &str) -> Result<()>;

    /// Takes one stats sample holding the current and previous counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist or the engine fails.
    async fn fetch_raw_stats(&self, id: &ContainerId) -> Result<RawStats>;

    /// Returns the last `tail` non-empty log lines (stdout and stderr).
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist or the engine fails.
    async fn fetch_logs(&self, id: &ContainerId, tail: usize) -> Result<Vec<String>>;

    /// Lists images held by the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    async fn list_images(&self) -> Result<Vec<Image>>;

    /// Removes an image, optionally forcing removal while referenced.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the image does not exist.
    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<()>;
}
