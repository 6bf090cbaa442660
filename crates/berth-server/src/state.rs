//! Shared state handed to every handler.

use std::sync::Arc;

use berth_control::Orchestrator;

use crate::identity::IdentityProvider;

/// Application state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle operations.
    pub orchestrator: Orchestrator,
    /// Bearer token verification.
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Creates the state from its parts.
    #[must_use]
    pub fn new(orchestrator: Orchestrator, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            orchestrator,
            identity,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
