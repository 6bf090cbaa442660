//! Container and image lifecycle.
//!
//! Each mutating operation follows the same order: act through the engine,
//! then record the audit entry, then broadcast `refresh`. A failed engine
//! call stops the sequence, so rejected requests leave no trail and wake
//! no observers. Audit failures never fail the operation.
//!
//! The orchestrator keeps no copy of container state. Every decision is
//! made on what the engine reports at the time of the request.

use std::sync::Arc;

use berth_audit::{AuditAction, AuditEntry, AuditRecord, AuditRecorder, RecordOutcome};
use berth_common::constants::DEFAULT_LOG_TAIL;
use berth_common::error::{BerthError, Result};
use berth_common::types::{ContainerId, ContainerSummary, Image, ImageId, normalize_container_name};
use berth_events::{EventBus, Notification};
use berth_runtime::client::{CreateSpec, RuntimeClient};
use berth_runtime::metrics::MetricsSnapshot;
use serde_json::json;

use crate::context::{CreateRequest, RequestContext};

/// Composes the engine, the audit trail, and the event bus.
#[derive(Clone)]
pub struct Orchestrator {
    runtime: Arc<dyn RuntimeClient>,
    recorder: AuditRecorder,
    bus: EventBus,
    default_log_tail: usize,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("observers", &self.bus.observer_count())
            .field("default_log_tail", &self.default_log_tail)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(runtime: Arc<dyn RuntimeClient>, recorder: AuditRecorder, bus: EventBus) -> Self {
        Self {
            runtime,
            recorder,
            bus,
            default_log_tail: DEFAULT_LOG_TAIL,
        }
    }

    /// Sets the number of log lines returned when a request names none.
    #[must_use]
    pub fn with_default_log_tail(mut self, tail: usize) -> Self {
        self.default_log_tail = tail.max(1);
        self
    }

    /// Returns the event bus observers subscribe to.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Creates a container and starts it, pulling the image first if it is
    /// not present locally. Returns the short id of the new container.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank image reference. A failed pull
    /// aborts before anything is created; other engine failures propagate.
    pub async fn create(&self, ctx: &RequestContext, request: CreateRequest) -> Result<ContainerId> {
        let image = request.image.trim().to_string();
        if image.is_empty() {
            return Err(BerthError::validation("image is required"));
        }
        let name = request
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        if !self.runtime.image_present(&image).await? {
            tracing::info!(image = %image, "image not present locally, pulling");
            self.runtime.pull_image(&image).await?;
        }

        let spec = CreateSpec {
            image: image.clone(),
            name: name.clone(),
            ports: request.ports,
            env: request.env,
        };
        let id = self.runtime.create_container(&spec).await?;
        self.runtime.start_container(&id).await?;
        let short = id.short();
        tracing::info!(container = %short, image = %image, principal = %ctx.principal, "container created");

        let entry = AuditEntry::new(&ctx.principal, AuditAction::CreateContainer)
            .container(short.as_str())
            .image(image.as_str())
            .details(json!({ "image": image, "name": name }));
        self.finish(ctx, entry).await;
        Ok(short)
    }

    /// Starts a stopped container.
    ///
    /// # Errors
    ///
    /// Propagates engine failures, including `Conflict` when the container
    /// is already running.
    pub async fn start(&self, ctx: &RequestContext, id: &ContainerId) -> Result<()> {
        self.runtime.start_container(id).await?;
        tracing::info!(container = %id, principal = %ctx.principal, "container started");
        self.finish(ctx, container_entry(ctx, AuditAction::StartContainer, id))
            .await;
        Ok(())
    }

    /// Stops a running container.
    ///
    /// # Errors
    ///
    /// Propagates engine failures, including `Conflict` when the container
    /// is already stopped.
    pub async fn stop(&self, ctx: &RequestContext, id: &ContainerId) -> Result<()> {
        self.runtime.stop_container(id).await?;
        tracing::info!(container = %id, principal = %ctx.principal, "container stopped");
        self.finish(ctx, container_entry(ctx, AuditAction::StopContainer, id))
            .await;
        Ok(())
    }

    /// Removes a container that is not running.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` without touching the container when the engine
    /// reports it running, `NotFound` when it does not exist.
    pub async fn delete(&self, ctx: &RequestContext, id: &ContainerId) -> Result<()> {
        let detail = self.runtime.inspect_container(id).await?;
        if detail.running {
            tracing::debug!(container = %id, "refusing to delete running container");
            return Err(BerthError::conflict("container is running"));
        }
        self.runtime.remove_container(id).await?;
        tracing::info!(container = %id, principal = %ctx.principal, "container deleted");
        self.finish(ctx, container_entry(ctx, AuditAction::DeleteContainer, id))
            .await;
        Ok(())
    }

    /// Force-removes an image, even while containers reference it.
    ///
    /// # Errors
    ///
    /// Propagates engine failures, including `NotFound`.
    pub async fn delete_image(&self, ctx: &RequestContext, id: &ImageId) -> Result<()> {
        self.runtime.remove_image(id, true).await?;
        tracing::info!(image = %id, principal = %ctx.principal, "image deleted");
        let entry = AuditEntry::new(&ctx.principal, AuditAction::DeleteImage)
            .image(id.as_str())
            .details(json!({ "imageId": id.as_str() }));
        self.finish(ctx, entry).await;
        Ok(())
    }

    /// Lists every container, stopped ones included.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub async fn list(&self) -> Result<Vec<ContainerSummary>> {
        let mut containers = self.runtime.list_containers(true).await?;
        for container in &mut containers {
            container.name = normalize_container_name(&container.name);
        }
        Ok(containers)
    }

    /// Lists images held by the engine.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub async fn list_images(&self) -> Result<Vec<Image>> {
        self.runtime.list_images().await
    }

    /// Returns the current utilization of a container.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub async fn stats(&self, id: &ContainerId) -> Result<MetricsSnapshot> {
        let raw = self.runtime.fetch_raw_stats(id).await?;
        Ok(MetricsSnapshot::from_raw(&raw))
    }

    /// Returns the last `tail` log lines of a container.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub async fn logs(&self, id: &ContainerId, tail: Option<usize>) -> Result<Vec<String>> {
        let tail = tail.filter(|t| *t > 0).unwrap_or(self.default_log_tail);
        self.runtime.fetch_logs(id, tail).await
    }

    /// Returns the caller's own audit records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit store cannot be read.
    pub async fn audit_log(
        &self,
        ctx: &RequestContext,
        limit: Option<usize>,
    ) -> Result<Vec<AuditRecord>> {
        self.recorder.query(Some(&ctx.principal.id), limit).await
    }

    /// Records a sign-in.
    pub async fn login(&self, ctx: &RequestContext) -> RecordOutcome {
        let entry = AuditEntry::new(&ctx.principal, AuditAction::Login)
            .details(json!({ "email": ctx.principal.email }))
            .source(ctx.source.clone());
        self.recorder.record(entry).await
    }

    /// Records a sign-out.
    pub async fn logout(&self, ctx: &RequestContext) -> RecordOutcome {
        let entry =
            AuditEntry::new(&ctx.principal, AuditAction::Logout).source(ctx.source.clone());
        self.recorder.record(entry).await
    }

    async fn finish(&self, ctx: &RequestContext, entry: AuditEntry) {
        let _ = self.recorder.record(entry.source(ctx.source.clone())).await;
        let _ = self.bus.broadcast(Notification::Refresh);
    }
}

fn container_entry(ctx: &RequestContext, action: AuditAction, id: &ContainerId) -> AuditEntry {
    AuditEntry::new(&ctx.principal, action)
        .container(id.as_str())
        .details(json!({ "containerId": id.as_str() }))
}
