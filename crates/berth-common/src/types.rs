//! Domain primitive types used across the Berth workspace.
//!
//! Containers and images are owned by the engine. These are transient
//! views fetched per request, never persisted by Berth.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BerthError, Result};

/// Number of characters in a short engine identifier.
pub const SHORT_ID_LEN: usize = 12;

/// Tag reported for images the engine holds without any repository tag.
pub const UNTAGGED: &str = "<none>:<none>";

/// Engine-assigned identifier of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier truncated to its short display form.
    #[must_use]
    pub fn short(&self) -> Self {
        Self(truncate_id(&self.0))
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine-assigned identifier (or reference) of an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(String);

impl ImageId {
    /// Creates a new image ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier truncated to its short display form.
    ///
    /// A `sha256:` prefix is dropped before truncating.
    #[must_use]
    pub fn short(&self) -> Self {
        let raw = self.0.strip_prefix("sha256:").unwrap_or(&self.0);
        Self(truncate_id(raw))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn truncate_id(raw: &str) -> String {
    raw.chars().take(SHORT_ID_LEN).collect()
}

/// Lifecycle state of a container as observed from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Container has been created but not yet started.
    Created,
    /// Container is actively running.
    Running,
    /// Container has exited or been stopped.
    Stopped,
    /// Container is being removed.
    Removed,
    /// Any state the engine reports that has no canonical counterpart.
    Unknown,
}

impl ContainerStatus {
    /// Maps an engine state string onto the canonical vocabulary.
    #[must_use]
    pub fn from_engine(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" | "restarting" => Self::Running,
            "exited" | "dead" | "stopped" => Self::Stopped,
            "removing" | "removed" => Self::Removed,
            _ => Self::Unknown,
        }
    }

    /// Returns whether the container is currently running.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Removed => write!(f, "removed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP (the engine default).
    #[default]
    Tcp,
    /// UDP.
    Udp,
    /// SCTP.
    Sctp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
            Self::Sctp => write!(f, "sctp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = BerthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "sctp" => Ok(Self::Sctp),
            other => Err(BerthError::validation(format!(
                "unsupported port protocol: {other}"
            ))),
        }
    }
}

/// A container port, optionally published on the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port inside the container.
    pub container_port: u16,
    /// Host port it is published on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    /// Host address the port is bound to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Transport protocol.
    #[serde(default)]
    pub protocol: Protocol,
}

impl PortMapping {
    /// Returns the engine key for this port, e.g. `80/tcp`.
    #[must_use]
    pub fn engine_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

impl FromStr for PortMapping {
    type Err = BerthError;

    /// Parses `[host:]container[/protocol]`, e.g. `8080:80/tcp` or `53/udp`.
    fn from_str(s: &str) -> Result<Self> {
        let (ports, protocol) = match s.split_once('/') {
            Some((ports, proto)) => (ports, proto.parse()?),
            None => (s, Protocol::Tcp),
        };
        let parse_port = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| BerthError::validation(format!("invalid port in mapping: {s}")))
        };
        let (host_port, container_port) = match ports.split_once(':') {
            Some((host, container)) => (Some(parse_port(host)?), parse_port(container)?),
            None => (None, parse_port(ports)?),
        };
        Ok(Self {
            container_port,
            host_port,
            host_ip: None,
            protocol,
        })
    }
}

/// Transient view of a container as listed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Short engine identifier.
    pub id: ContainerId,
    /// Display name without the engine's leading `/`.
    pub name: String,
    /// Image reference the container was created from.
    pub image: String,
    /// Canonical lifecycle status.
    pub status: ContainerStatus,
    /// Published ports, in engine order.
    pub ports: Vec<PortMapping>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Transient view of an image held by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Short engine identifier.
    pub id: ImageId,
    /// Repository tags; `[UNTAGGED]` when the engine reports none.
    pub tags: Vec<String>,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// The authenticated identity a request is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier assigned by the identity provider.
    pub id: String,
    /// Contact address, when the provider exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Principal {
    /// Creates a principal with no email.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Strips the `/` prefix the engine prepends to container names.
#[must_use]
pub fn normalize_container_name(raw: &str) -> String {
    raw.trim_start_matches('/').to_string()
}
