//! Error types for the dashboard.
//!
//! Fetch failures are recoverable and never leave the poll cycle; they are
//! reported through [`FetchError`] and a notification. [`DashboardError`]
//! covers the few conditions that stop the dashboard from mounting at all.

use crate::metrics::MetricKey;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Classification of a fetch failure, used for logging and cycle outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// No bearer credential was available; no request was sent
    AuthMissing,
    /// Transport error, timeout, or non-success status
    Network,
    /// Backend rejected the credential (401/403)
    Unauthorized,
    /// Body was not a single finite number
    MalformedResponse,
}

impl FetchErrorKind {
    /// Whether the next scheduled cycle can be expected to fix this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::MalformedResponse)
    }
}

/// A single fetch task's failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("no authentication token available")]
    AuthMissing,

    #[error("network failure: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("credential rejected with status {0}")]
    Unauthorized(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::AuthMissing => FetchErrorKind::AuthMissing,
            Self::Network(_) | Self::Timeout(_) => FetchErrorKind::Network,
            Self::Unauthorized(_) => FetchErrorKind::Unauthorized,
            Self::MalformedResponse(_) => FetchErrorKind::MalformedResponse,
        }
    }
}

/// Errors that prevent the dashboard from starting.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// A store or fetch task referenced a metric that was never registered.
    /// Indicates a wiring mistake between the task set and the store.
    #[error("unknown metric: {0}")]
    UnknownMetric(MetricKey),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
