//! Wiring of collaborators and the serve loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use berth_audit::file::FileAuditStore;
use berth_audit::postgrest::PostgrestAuditStore;
use berth_audit::{AuditRecorder, AuditStore, MemoryAuditStore};
use berth_common::config::{AuditBackend, BerthConfig};
use berth_common::error::Result;
use berth_control::Orchestrator;
use berth_events::EventBus;
use berth_runtime::client::RuntimeClient;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::identity;
use crate::routes::router;
use crate::state::AppState;

/// Opens the audit store selected by configuration.
///
/// # Errors
///
/// Returns an error if the store cannot be opened.
pub fn audit_store(backend: &AuditBackend) -> Result<Arc<dyn AuditStore>> {
    Ok(match backend {
        AuditBackend::Memory => Arc::new(MemoryAuditStore::new()),
        AuditBackend::File { path } => Arc::new(FileAuditStore::open(path)?),
        AuditBackend::Postgrest {
            url,
            api_key,
            table,
        } => Arc::new(PostgrestAuditStore::new(url, api_key.clone(), table)?),
    })
}

/// Assembles application state from configuration and an engine.
///
/// # Errors
///
/// Returns an error if the audit store or identity provider cannot be
/// constructed.
pub fn build_state(config: &BerthConfig, runtime: Arc<dyn RuntimeClient>) -> Result<AppState> {
    let recorder = AuditRecorder::new(audit_store(&config.audit)?);
    let orchestrator = Orchestrator::new(runtime, recorder, EventBus::new())
        .with_default_log_tail(config.default_log_tail);
    Ok(AppState::new(orchestrator, identity::from_config(&config.identity)?))
}

/// Serves the API on `listener` until `shutdown` resolves.
///
/// A heartbeat task pings every observer each `heartbeat` period for as
/// long as the server runs. On shutdown every observer is disconnected so
/// open notification streams do not hold the server open.
///
/// # Errors
///
/// Returns an error if the listener fails.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    heartbeat: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let bus = state.orchestrator.bus().clone();
    let heartbeat = bus.spawn_heartbeat(heartbeat);
    let app = router(state);
    tracing::info!(addr = %listener.local_addr()?, "listening");
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        let _ = bus.disconnect_all();
    })
    .await;
    heartbeat.abort();
    tracing::info!("server stopped");
    result
}

/// A server running on a background task.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Binds `addr` and serves `state` on a spawned task.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn spawn(
        addr: SocketAddr,
        state: AppState,
        heartbeat: Duration,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, state, heartbeat, async move {
            let _ = rx.await;
        }));
        Ok(Self {
            addr,
            shutdown: tx,
            task,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting connections and waits for in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the serve loop failed.
    pub async fn shutdown(self) -> std::io::Result<()> {
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| std::io::Error::other(format!("server task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_audit_backend_opens() {
        assert!(audit_store(&AuditBackend::Memory).is_ok());
    }

    #[test]
    fn file_audit_backend_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail").join("audit.jsonl");
        assert!(audit_store(&AuditBackend::File { path }).is_ok());
        assert!(dir.path().join("trail").is_dir());
    }
}
