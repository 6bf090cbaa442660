//! `berthd serve`: run the control plane.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use berth_common::config::{AuditBackend, BerthConfig};
use berth_runtime::client::RuntimeClient;
use berth_runtime::docker::DockerClient;
use berth_runtime::memory::InMemoryRuntime;
use berth_server::{build_state, serve};
use clap::Args;
use tokio::net::TcpListener;

/// Arguments for the `serve` command.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// JSON configuration file.
    #[arg(short, long, env = "BERTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "BERTH_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Engine API endpoint, e.g. `http://127.0.0.1:2375`.
    #[arg(long, env = "BERTH_RUNTIME_ENDPOINT")]
    pub runtime_endpoint: Option<String>,

    /// Write the audit trail to this JSON-lines file.
    #[arg(long)]
    pub audit_file: Option<PathBuf>,

    /// Use an in-process engine instead of a real one.
    #[arg(long)]
    pub in_memory_runtime: bool,
}

/// Loads the configuration file, if any, and applies flag overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the result is invalid.
pub fn resolve_config(args: &ServeArgs) -> anyhow::Result<BerthConfig> {
    let mut config = match &args.config {
        Some(path) => BerthConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => BerthConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(endpoint) = &args.runtime_endpoint {
        config.runtime_endpoint.clone_from(endpoint);
    }
    if let Some(path) = &args.audit_file {
        config.audit = AuditBackend::File { path: path.clone() };
    }
    config.validate()?;
    Ok(config)
}

/// Executes the `serve` command.
///
/// # Errors
///
/// Returns an error if configuration, wiring, or binding fails.
pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;

    let runtime: Arc<dyn RuntimeClient> = if args.in_memory_runtime {
        tracing::warn!("using in-memory engine; containers are not real");
        Arc::new(InMemoryRuntime::new())
    } else {
        tracing::info!(endpoint = %config.runtime_endpoint, "using engine API");
        Arc::new(DockerClient::new(config.runtime_endpoint.clone())?)
    };

    let state = build_state(&config, runtime)?;
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;

    serve(
        listener,
        state,
        Duration::from_secs(config.heartbeat_interval_secs),
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
        },
    )
    .await?;
    Ok(())
}
