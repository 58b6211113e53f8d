//! Error types for the garak-sdk library.
//!
//! Every failure is returned as a typed [`ClientError`]; the library never
//! panics on remote input.

use crate::core::response::RateLimitInfo;
use crate::core::types::ScanStatus;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for API operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credentials were rejected (HTTP 401/403) or are missing.
    #[error("authentication failed: {message}")]
    Authentication {
        /// HTTP status the rejection came with; `None` for client-side failures.
        status: Option<u16>,
        /// Human-readable reason.
        message: String,
    },

    /// The request was rejected as malformed, either client-side or with HTTP 400.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the request.
        message: String,
        /// Structured details from the error envelope, if any.
        details: Option<serde_json::Value>,
    },

    /// A scan, generator, category or report does not exist (HTTP 404).
    #[error("{resource} not found: {message}")]
    NotFound {
        /// Kind of resource (`scan`, `report`, ...) or the request path.
        resource: String,
        /// Message from the error envelope.
        message: String,
    },

    /// The backend throttled the request (HTTP 429).
    #[error("rate limit exceeded: retry after {retry_after:?}")]
    RateLimited {
        /// Suggested wait time before retrying.
        retry_after: Option<Duration>,
        /// Rate limit headers observed on the rejected response.
        rate_limit: Option<RateLimitInfo>,
    },

    /// The client-side wait deadline elapsed before the scan finished.
    #[error("scan '{scan_id}' timed out after {elapsed:?} (last status: {last_status})")]
    ScanTimeout {
        /// Scan being waited on.
        scan_id: String,
        /// Time spent waiting.
        elapsed: Duration,
        /// Last status observed before the deadline.
        last_status: ScanStatus,
    },

    /// Results were requested for a scan that has not completed.
    #[error("scan '{scan_id}' has not completed (status: {status})")]
    ScanNotCompleted {
        /// Scan identifier.
        scan_id: String,
        /// Current status of the scan.
        status: ScanStatus,
    },

    /// An unknown report type was requested.
    #[error("invalid report type '{report_type}' (expected one of json, jsonl, html, hits)")]
    InvalidReportType {
        /// The rejected value.
        report_type: String,
    },

    /// Connection failure or request timeout.
    #[error("network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
    },

    /// The backend failed with a 5xx status.
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message from the error envelope.
        message: String,
    },

    /// The resource is still referenced by active scans (HTTP 409).
    #[error("conflict: {message}")]
    AgentInUse {
        /// Message from the error envelope.
        message: String,
    },

    /// The caller's scan quota is exhausted.
    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        /// Message describing the exhausted quota.
        message: String,
    },

    /// Any other non-success status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The envelope's `error` code, if present.
        error_code: Option<String>,
        /// Message from the error envelope.
        message: String,
    },

    /// A response body did not match the expected schema.
    #[error("failed to decode response from {context}: {message}")]
    Decode {
        /// Endpoint or record being decoded.
        context: String,
        /// Decoder error.
        message: String,
    },

    /// The client was configured incorrectly.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// Refused to overwrite an existing file.
    #[error("file already exists: {}", path.display())]
    FileExists {
        /// Path that already exists.
        path: PathBuf,
    },

    /// The operation was cancelled by the caller.
    #[error("operation was cancelled")]
    Cancelled,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Returns `true` if the error is transient and the request may be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Server { .. } | Self::RateLimited { .. }
        )
    }

    /// Returns the HTTP status this error was mapped from, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            Self::Validation { .. } => Some(400),
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::AgentInUse { .. } => Some(409),
            Self::Server { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the server-suggested retry delay for rate-limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Creates an `Authentication` error that did not come from an HTTP response.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a `Validation` error without details.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a `NotFound` error.
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates a `Network` error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a `Decode` error.
    pub fn decode(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a `QuotaExceeded` error.
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for API operations.
pub type ClientResult<T> = Result<T, ClientError>;
