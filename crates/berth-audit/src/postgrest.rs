//! Audit storage in a relational table exposed through PostgREST.
//!
//! The table holds `id`, `user_id`, `action`, `container_id`,
//! `image_name`, `details`, `ip_address`, and a database-assigned
//! `created_at`. Queried rows that cannot be read back are skipped with
//! a warning rather than failing the whole query.

use async_trait::async_trait;
use berth_common::error::{BerthError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{AuditAction, AuditEntry, AuditRecord};
use crate::store::AuditStore;

/// Audit store backed by a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct PostgrestAuditStore {
    table_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl PostgrestAuditStore {
    /// Creates a store writing to `table` under `{base_url}/rest/v1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, api_key: impl Into<String>, table: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BerthError::Config {
                message: format!("failed to build audit HTTP client: {e}"),
            })?;
        Ok(Self {
            table_url: format!("{}/rest/v1/{table}", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            http,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

fn store_error(context: &str, e: impl std::fmt::Display) -> BerthError {
    BerthError::Audit {
        message: format!("{context}: {e}"),
    }
}

async fn rows(response: reqwest::Response, context: &str) -> Result<Vec<Row>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(store_error(context, format!("{status} {body}")));
    }
    response.json().await.map_err(|e| store_error(context, e))
}

#[async_trait]
impl AuditStore for PostgrestAuditStore {
    async fn insert(&self, entry: AuditEntry) -> Result<AuditRecord> {
        let row = NewRow {
            user_id: &entry.principal,
            action: entry.action.as_str(),
            container_id: entry.container_id.as_deref(),
            image_name: entry.image.as_deref(),
            details: &entry.details,
            ip_address: entry.source_address.as_deref(),
        };
        let request = self
            .authorized(self.http.post(&self.table_url))
            .header("Prefer", "return=representation")
            .json(&[row]);
        let response = request
            .send()
            .await
            .map_err(|e| store_error("audit insert failed", e))?;
        rows(response, "audit insert rejected")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| store_error("audit insert", "no row returned"))?
            .into_record()
    }

    async fn query(&self, principal: Option<&str>, limit: usize) -> Result<Vec<AuditRecord>> {
        let mut request = self.authorized(self.http.get(&self.table_url)).query(&[
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        if let Some(principal) = principal {
            request = request.query(&[("user_id", format!("eq.{principal}"))]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| store_error("audit query failed", e))?;
        Ok(readable(rows(response, "audit query rejected").await?))
    }
}

fn readable(rows: Vec<Row>) -> Vec<AuditRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            row.into_record()
                .map_err(|e| tracing::warn!(row = %id, error = %e, "skipping unreadable audit row"))
                .ok()
        })
        .collect()
}

#[derive(Serialize)]
struct NewRow<'a> {
    user_id: &'a str,
    action: &'a str,
    container_id: Option<&'a str>,
    image_name: Option<&'a str>,
    details: &'a Value,
    ip_address: Option<&'a str>,
}

#[derive(Deserialize)]
struct Row {
    id: Value,
    user_id: String,
    action: String,
    container_id: Option<String>,
    image_name: Option<String>,
    #[serde(default)]
    details: Value,
    ip_address: Option<String>,
    created_at: DateTime<Utc>,
}

impl Row {
    fn into_record(self) -> Result<AuditRecord> {
        let id = match self.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        // Older rows stored details as a JSON-encoded string.
        let details = match self.details {
            Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            other => other,
        };
        Ok(AuditRecord {
            id,
            principal: self.user_id,
            action: self.action.parse::<AuditAction>()?,
            container_id: self.container_id,
            image: self.image_name,
            details,
            source_address: self.ip_address,
            created_at: self.created_at,
        })
    }
}
