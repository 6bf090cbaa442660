//! Request inputs handed to the orchestrator.

use berth_common::types::{PortMapping, Principal};

/// Who is acting, and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated principal the action is attributed to.
    pub principal: Principal,
    /// Network address the request came from.
    pub source: Option<String>,
}

impl RequestContext {
    /// Creates a context with no known source address.
    #[must_use]
    pub const fn new(principal: Principal) -> Self {
        Self {
            principal,
            source: None,
        }
    }

    /// Sets the source address.
    #[must_use]
    pub fn from_address(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Parameters of a create-and-start request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRequest {
    /// Image reference. Must not be blank.
    pub image: String,
    /// Optional container name.
    pub name: Option<String>,
    /// Ports to publish.
    pub ports: Vec<PortMapping>,
    /// Environment in `KEY=value` form.
    pub env: Vec<String>,
}

impl CreateRequest {
    /// Starts a request for `image`.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    /// Sets the container name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds an environment entry in `KEY=value` form.
    #[must_use]
    pub fn env(mut self, entry: impl Into<String>) -> Self {
        self.env.push(entry.into());
        self
    }
}
