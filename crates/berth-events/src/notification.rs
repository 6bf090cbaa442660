//! Notification messages pushed to observers.

use std::fmt;

/// A content-free push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    /// State changed; observers should re-fetch.
    Refresh,
    /// Keep-alive.
    Ping,
}

impl Notification {
    /// Returns the event name carried on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Ping => "ping",
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
