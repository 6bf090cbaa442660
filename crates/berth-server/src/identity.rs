//! Identity collaborators: token verification and credential exchange.
//!
//! The control plane never stores or mints credentials of its own. A
//! provider either knows a fixed set of operators from configuration or
//! delegates to a Supabase-compatible auth endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use berth_common::config::{IdentityBackend, StaticUser};
use berth_common::error::{BerthError, Result};
use berth_common::types::Principal;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// A bearer token issued for a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Bearer credential for subsequent requests.
    pub token: String,
    /// Who the token identifies.
    pub principal: Principal,
}

/// Verifies bearer tokens and exchanges credentials for them.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a bearer token to the principal it identifies.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the token is unknown or expired.
    async fn verify(&self, token: &str) -> Result<Principal>;

    /// Exchanges an email and password for a session.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the credentials are rejected.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
}

/// Builds the provider selected by configuration.
///
/// # Errors
///
/// Returns an error if the provider's HTTP client cannot be constructed.
pub fn from_config(backend: &IdentityBackend) -> Result<Arc<dyn IdentityProvider>> {
    Ok(match backend {
        IdentityBackend::Static { users } => Arc::new(StaticIdentity::new(users.clone())),
        IdentityBackend::Supabase { url, anon_key } => {
            Arc::new(SupabaseIdentity::new(url, anon_key.clone())?)
        }
    })
}

/// Operators declared up front, each with a fixed token.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    users: Vec<StaticUser>,
}

impl StaticIdentity {
    /// Creates a provider for the given operators.
    #[must_use]
    pub const fn new(users: Vec<StaticUser>) -> Self {
        Self { users }
    }
}

fn principal_of(user: &StaticUser) -> Principal {
    Principal {
        id: user.id.clone(),
        email: Some(user.email.clone()),
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify(&self, token: &str) -> Result<Principal> {
        self.users
            .iter()
            .find(|u| u.token == token)
            .map(principal_of)
            .ok_or_else(|| BerthError::unauthorized("invalid token"))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email) && u.password == password)
            .map(|u| Session {
                token: u.token.clone(),
                principal: principal_of(u),
            })
            .ok_or_else(|| BerthError::unauthorized("invalid email or password"))
    }
}

/// Delegates to a Supabase-compatible `/auth/v1` endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseIdentity {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct RemoteUser {
    id: String,
    email: Option<String>,
}

impl From<RemoteUser> for Principal {
    fn from(user: RemoteUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Deserialize)]
struct TokenGrant {
    access_token: String,
    user: RemoteUser,
}

impl SupabaseIdentity {
    /// Creates a provider for the project at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BerthError::Config {
                message: format!("failed to build identity HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            http,
        })
    }

    fn unreachable(e: &reqwest::Error) -> BerthError {
        BerthError::runtime(format!("identity provider unreachable: {e}"))
    }

    async fn rejected(response: reqwest::Response, fallback: &str) -> BerthError {
        let status = response.status();
        if status.is_client_error() {
            return BerthError::unauthorized(fallback);
        }
        let body = response.text().await.unwrap_or_default();
        BerthError::runtime(format!("identity provider returned {status}: {body}"))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn verify(&self, token: &str) -> Result<Principal> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Self::unreachable(&e))?;
        if response.status() != StatusCode::OK {
            return Err(Self::rejected(response, "invalid token").await);
        }
        let user: RemoteUser = response
            .json()
            .await
            .map_err(|e| BerthError::unauthorized(format!("invalid token: {e}")))?;
        Ok(user.into())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .http
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| Self::unreachable(&e))?;
        if !response.status().is_success() {
            return Err(Self::rejected(response, "invalid email or password").await);
        }
        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| BerthError::runtime(format!("malformed token grant: {e}")))?;
        Ok(Session {
            token: grant.access_token,
            principal: grant.user.into(),
        })
    }
}
