//! Unified error types for the Berth workspace.
//!
//! The first five variants are the taxonomy reported back to the request
//! that caused them. The remaining variants are infrastructure failures
//! (files, configuration, audit storage) that surface as internal errors.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BerthError {
    /// The request carried invalid input.
    #[error("{message}")]
    Validation {
        /// Description of what is wrong with the input.
        message: String,
    },

    /// The credential was missing or rejected.
    #[error("{message}")]
    Unauthorized {
        /// Reason the credential was rejected.
        message: String,
    },

    /// The request conflicts with the current state of the target.
    #[error("{message}")]
    Conflict {
        /// Description of the conflicting state.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The container engine reported a failure.
    #[error("{message}")]
    Runtime {
        /// Message passed through from the engine.
        message: String,
    },

    /// The audit store rejected a read or write.
    #[error("audit store error: {message}")]
    Audit {
        /// Description of the store failure.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// User-correctable input error.
    Validation,
    /// Missing or invalid credential.
    Unauthorized,
    /// Rejected because of the target's current state.
    Conflict,
    /// Unknown container or image.
    NotFound,
    /// Engine, storage, or other internal failure.
    Internal,
}

impl BerthError {
    /// Builds a [`BerthError::Validation`] from any message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Builds a [`BerthError::Unauthorized`] from any message.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Builds a [`BerthError::Conflict`] from any message.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Builds a [`BerthError::Runtime`] from any message.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Runtime { .. }
            | Self::Audit { .. }
            | Self::Io { .. }
            | Self::Config { .. }
            | Self::Serialization { .. } => ErrorKind::Internal,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BerthError>;
