//! Service configuration model.
//!
//! Loaded from an optional JSON file; missing fields take their defaults.
//! Command-line flags are applied on top by the binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{BerthError, Result};

/// Root configuration for the Berth control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BerthConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Base URL of the engine API, e.g. `http://127.0.0.1:2375`.
    pub runtime_endpoint: String,
    /// Seconds between keep-alive frames on the notification stream.
    pub heartbeat_interval_secs: u64,
    /// Log lines returned when a request gives no tail.
    pub default_log_tail: usize,
    /// Where audit records are stored.
    pub audit: AuditBackend,
    /// How bearer credentials are verified.
    pub identity: IdentityBackend,
}

impl Default for BerthConfig {
    fn default() -> Self {
        Self {
            listen_addr: constants::DEFAULT_LISTEN_ADDR,
            runtime_endpoint: constants::DEFAULT_RUNTIME_ENDPOINT.to_string(),
            heartbeat_interval_secs: constants::HEARTBEAT_INTERVAL_SECS,
            default_log_tail: constants::DEFAULT_LOG_TAIL,
            audit: AuditBackend::File {
                path: constants::default_audit_file(),
            },
            identity: IdentityBackend::Static { users: Vec::new() },
        }
    }
}

impl BerthConfig {
    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BerthError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_secs == 0 {
            return Err(BerthError::Config {
                message: "heartbeat_interval_secs must be positive".into(),
            });
        }
        if self.default_log_tail == 0 {
            return Err(BerthError::Config {
                message: "default_log_tail must be positive".into(),
            });
        }
        if !(self.runtime_endpoint.starts_with("http://")
            || self.runtime_endpoint.starts_with("https://"))
        {
            return Err(BerthError::Config {
                message: format!(
                    "runtime_endpoint must be an http(s) URL: {}",
                    self.runtime_endpoint
                ),
            });
        }
        if let IdentityBackend::Static { users } = &self.identity {
            let mut tokens: Vec<&str> = users.iter().map(|u| u.token.as_str()).collect();
            tokens.sort_unstable();
            if tokens.windows(2).any(|w| w[0] == w[1]) {
                return Err(BerthError::Config {
                    message: "static identity tokens must be unique".into(),
                });
            }
        }
        Ok(())
    }
}

/// Audit store selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AuditBackend {
    /// Keep records in memory for the lifetime of the process.
    Memory,
    /// Append records to a JSON-lines file.
    File {
        /// Path of the audit trail.
        path: PathBuf,
    },
    /// Insert records into a table behind a PostgREST endpoint.
    Postgrest {
        /// Base URL of the project, without the `/rest/v1` suffix.
        url: String,
        /// Service key sent as `apikey` and bearer credential.
        api_key: String,
        /// Target table.
        #[serde(default = "default_audit_table")]
        table: String,
    },
}

fn default_audit_table() -> String {
    constants::DEFAULT_AUDIT_TABLE.to_string()
}

/// Identity provider selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdentityBackend {
    /// A fixed set of operators declared in the configuration.
    Static {
        /// Declared operators.
        #[serde(default)]
        users: Vec<StaticUser>,
    },
    /// A Supabase-compatible auth endpoint.
    Supabase {
        /// Base URL of the project.
        url: String,
        /// Public (anon) key sent as `apikey`.
        anon_key: String,
    },
}

/// An operator declared in a static identity configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticUser {
    /// Principal identifier recorded in the audit trail.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Login password.
    pub password: String,
    /// Bearer token issued on login and accepted on requests.
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BerthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.heartbeat_interval_secs, 30);
        assert_eq!(config.listen_addr.port(), 3000);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("berth.json");
        std::fs::write(
            &path,
            r#"{
                "runtime_endpoint": "http://10.0.0.5:2375",
                "audit": { "kind": "memory" },
                "identity": {
                    "kind": "static",
                    "users": [{ "id": "u1", "email": "ops@example.com", "password": "pw", "token": "t1" }]
                }
            }"#,
        )
        .expect("write");

        let config = BerthConfig::load(&path).expect("load");
        assert_eq!(config.runtime_endpoint, "http://10.0.0.5:2375");
        assert_eq!(config.audit, AuditBackend::Memory);
        assert_eq!(config.default_log_tail, 100);
        assert!(matches!(config.identity, IdentityBackend::Static { ref users } if users.len() == 1));
    }

    #[test]
    fn postgrest_table_defaults_to_logs() {
        let backend: AuditBackend =
            serde_json::from_str(r#"{ "kind": "postgrest", "url": "https://x", "api_key": "k" }"#)
                .expect("parse");
        assert!(matches!(backend, AuditBackend::Postgrest { ref table, .. } if table == "logs"));
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        let config = BerthConfig {
            heartbeat_interval_secs: 0,
            ..BerthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let config = BerthConfig {
            runtime_endpoint: "unix:///var/run/docker.sock".into(),
            ..BerthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_static_tokens_are_rejected() {
        let user = StaticUser {
            id: "a".into(),
            email: "a@example.com".into(),
            password: "pw".into(),
            token: "same".into(),
        };
        let config = BerthConfig {
            identity: IdentityBackend::Static {
                users: vec![
                    user.clone(),
                    StaticUser {
                        id: "b".into(),
                        ..user
                    },
                ],
            },
            ..BerthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = BerthConfig::load(Path::new("/nonexistent/berth.json")).unwrap_err();
        assert!(matches!(err, BerthError::Io { .. }));
    }
}
