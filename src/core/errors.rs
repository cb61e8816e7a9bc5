//! VSW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, VsError>;

/// Top-level error type for volsweep.
#[derive(Debug, Error)]
pub enum VsError {
    #[error("[VSW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[VSW-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[VSW-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[VSW-2001] backend {backend} unavailable: {details}")]
    Unavailable {
        backend: &'static str,
        details: String,
    },

    #[error("[VSW-2002] volume not found: {name}")]
    NotFound { name: String },

    #[error("[VSW-2003] volume {name} is in use: {details}")]
    InUse { name: String, details: String },

    #[error("[VSW-2004] {operation} cancelled")]
    Cancelled { operation: String },

    #[error("[VSW-2005] invalid volume name {name:?}")]
    InvalidVolumeName { name: String },

    #[error("[VSW-2006] backend failure during {operation}: {details}")]
    Backend { operation: String, details: String },

    #[error("[VSW-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[VSW-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[VSW-3002] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[VSW-3900] runtime failure: {details}")]
    Runtime { details: String },
}

/// Coarse failure classes callers branch on (retry vs. abort vs. report).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unavailable,
    NotFound,
    InUse,
    Cancelled,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::NotFound => "not_found",
            Self::InUse => "in_use",
            Self::Cancelled => "cancelled",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        }
    }
}

impl VsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "VSW-1001",
            Self::MissingConfig { .. } => "VSW-1002",
            Self::ConfigParse { .. } => "VSW-1003",
            Self::Unavailable { .. } => "VSW-2001",
            Self::NotFound { .. } => "VSW-2002",
            Self::InUse { .. } => "VSW-2003",
            Self::Cancelled { .. } => "VSW-2004",
            Self::InvalidVolumeName { .. } => "VSW-2005",
            Self::Backend { .. } => "VSW-2006",
            Self::Serialization { .. } => "VSW-2101",
            Self::Io { .. } => "VSW-3001",
            Self::ChannelClosed { .. } => "VSW-3002",
            Self::Runtime { .. } => "VSW-3900",
        }
    }

    /// Failure class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InUse { .. } => ErrorKind::InUse,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidConfig { .. }
            | Self::MissingConfig { .. }
            | Self::ConfigParse { .. }
            | Self::InvalidVolumeName { .. } => ErrorKind::InvalidInput,
            Self::Backend { .. }
            | Self::Serialization { .. }
            | Self::Io { .. }
            | Self::ChannelClosed { .. }
            | Self::Runtime { .. } => ErrorKind::Internal,
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. }
                | Self::Cancelled { .. }
                | Self::Backend { .. }
                | Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    #[must_use]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}

impl From<serde_json::Error> for VsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for VsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
