//! System-wide constants and default paths.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory for Berth data on hosts without a home directory.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/berth";

/// Returns the data directory, preferring `$HOME/.berth` and falling back
/// to `/var/lib/berth`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        let user_dir = PathBuf::from(home).join(".berth");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Returns the default JSON-lines audit trail path.
pub fn default_audit_file() -> PathBuf {
    data_dir().join("audit.jsonl")
}

/// Default address the HTTP server listens on.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000);

/// Default engine API endpoint.
pub const DEFAULT_RUNTIME_ENDPOINT: &str = "http://127.0.0.1:2375";

/// Seconds between keep-alive frames on the notification stream.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Maximum number of audit records returned when no limit is given.
pub const DEFAULT_AUDIT_LIMIT: usize = 100;

/// Number of log lines returned when no tail is given.
pub const DEFAULT_LOG_TAIL: usize = 100;

/// Default table name for PostgREST-backed audit storage.
pub const DEFAULT_AUDIT_TABLE: &str = "logs";
