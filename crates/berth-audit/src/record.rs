//! Audit record model.

use std::fmt;
use std::str::FromStr;

use berth_common::error::{BerthError, Result};
use berth_common::types::Principal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of action recorded in the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A principal signed in.
    Login,
    /// A principal signed out.
    Logout,
    /// A container was created and started.
    CreateContainer,
    /// A container was started.
    StartContainer,
    /// A container was stopped.
    StopContainer,
    /// A container was removed.
    DeleteContainer,
    /// An image was force-removed.
    DeleteImage,
}

impl AuditAction {
    /// Returns the wire name, e.g. `START_CONTAINER`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::CreateContainer => "CREATE_CONTAINER",
            Self::StartContainer => "START_CONTAINER",
            Self::StopContainer => "STOP_CONTAINER",
            Self::DeleteContainer => "DELETE_CONTAINER",
            Self::DeleteImage => "DELETE_IMAGE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = BerthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LOGIN" => Ok(Self::Login),
            "LOGOUT" => Ok(Self::Logout),
            "CREATE_CONTAINER" => Ok(Self::CreateContainer),
            "START_CONTAINER" => Ok(Self::StartContainer),
            "STOP_CONTAINER" => Ok(Self::StopContainer),
            "DELETE_CONTAINER" => Ok(Self::DeleteContainer),
            "DELETE_IMAGE" => Ok(Self::DeleteImage),
            other => Err(BerthError::Audit {
                message: format!("unknown audit action: {other}"),
            }),
        }
    }
}

/// An action about to be recorded. The store assigns identity and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Acting principal identifier.
    pub principal: String,
    /// Kind of action.
    pub action: AuditAction,
    /// Target container, if any.
    pub container_id: Option<String>,
    /// Target image, if any.
    pub image: Option<String>,
    /// Free-form structured detail.
    pub details: Value,
    /// Network address the request came from.
    pub source_address: Option<String>,
}

impl AuditEntry {
    /// Starts an entry for `principal` performing `action`.
    #[must_use]
    pub fn new(principal: &Principal, action: AuditAction) -> Self {
        Self {
            principal: principal.id.clone(),
            action,
            container_id: None,
            image: None,
            details: Value::Object(serde_json::Map::new()),
            source_address: None,
        }
    }

    /// Sets the target container.
    #[must_use]
    pub fn container(mut self, id: impl Into<String>) -> Self {
        self.container_id = Some(id.into());
        self
    }

    /// Sets the target image.
    #[must_use]
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Sets the structured detail payload.
    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Sets the origin address.
    #[must_use]
    pub fn source(mut self, address: Option<String>) -> Self {
        self.source_address = address;
        self
    }

    /// Seals the entry into a record with store-assigned identity and time.
    #[must_use]
    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            id,
            principal: self.principal,
            action: self.action,
            container_id: self.container_id,
            image: self.image,
            details: self.details,
            source_address: self.source_address,
            created_at,
        }
    }
}

/// An immutable, stored audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// Acting principal identifier.
    pub principal: String,
    /// Kind of action.
    pub action: AuditAction,
    /// Target container, if any.
    pub container_id: Option<String>,
    /// Target image, if any.
    pub image: Option<String>,
    /// Free-form structured detail.
    pub details: Value,
    /// Network address the request came from.
    pub source_address: Option<String>,
    /// Store-assigned creation time.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_use_screaming_snake_case() {
        let json = serde_json::to_string(&AuditAction::DeleteImage).unwrap();
        assert_eq!(json, "\"DELETE_IMAGE\"");
        assert_eq!(AuditAction::StartContainer.to_string(), "START_CONTAINER");
    }

    #[test]
    fn action_names_parse_back() {
        for action in [
            AuditAction::Login,
            AuditAction::Logout,
            AuditAction::CreateContainer,
            AuditAction::StartContainer,
            AuditAction::StopContainer,
            AuditAction::DeleteContainer,
            AuditAction::DeleteImage,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert!("REBOOT".parse::<AuditAction>().is_err());
    }

    #[test]
    fn entry_builder_sets_targets() {
        let entry = AuditEntry::new(&Principal::new("u1"), AuditAction::StopContainer)
            .container("abc")
            .source(Some("10.0.0.1".into()))
            .details(serde_json::json!({ "containerId": "abc" }));
        assert_eq!(entry.principal, "u1");
        assert_eq!(entry.container_id.as_deref(), Some("abc"));
        assert!(entry.image.is_none());
        assert_eq!(entry.details["containerId"], "abc");
    }
}
