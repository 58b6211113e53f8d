//! Incoming response envelope and HTTP status mapping.

use crate::core::error::ClientError;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Rate limit counters from `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Requests allowed in the current window.
    pub limit: Option<u64>,
    /// Requests remaining in the current window.
    pub remaining: Option<u64>,
    /// When the window resets (epoch seconds).
    pub reset: Option<u64>,
}

impl RateLimitInfo {
    /// Returns `true` if no budget remains in the current window.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Uniform error body: `{error, message, details?, timestamp?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Machine-readable error code.
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Structured details.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ErrorEnvelope {
    fn describe(&self, fallback: &str) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// A raw API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Headers with lower-cased names.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl ApiResponse {
    /// Creates a response with the given status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Creates a response with a JSON body.
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    /// Adds a header; names are stored lower-cased.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as `T`, naming `context` in any error.
    pub fn json<T: DeserializeOwned>(&self, context: &str) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::decode(context, e))
    }

    /// Parses the rate limit headers, if any are present.
    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        rate_limit_from(&self.headers)
    }

    /// Parses `Retry-After` as delta seconds or an HTTP date.
    pub fn retry_after(&self) -> Option<Duration> {
        let value = self.header("retry-after")?.trim();
        if let Ok(secs) = value.parse::<f64>() {
            return seconds_to_duration(secs);
        }
        let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
        (at - Utc::now()).to_std().ok().or(Some(Duration::ZERO))
    }

    fn envelope(&self) -> ErrorEnvelope {
        serde_json::from_slice(&self.body).unwrap_or_default()
    }

    /// Maps a non-2xx response to a typed error; successes pass through.
    ///
    /// `path` is the request path and is used to name the missing resource on 404.
    pub fn error_for_status(self, path: &str) -> Result<Self, ClientError> {
        if self.is_success() {
            return Ok(self);
        }

        let envelope = self.envelope();
        let status = self.status;
        let err = match status {
            400 => ClientError::Validation {
                message: envelope.describe("bad request"),
                details: envelope.details.clone(),
            },
            401 | 403 => ClientError::Authentication {
                status: Some(status),
                message: format!(
                    "Authentication failed ({status}): {}",
                    envelope.describe("credentials rejected")
                ),
            },
            402 => ClientError::quota_exceeded(envelope.describe("scan quota exhausted")),
            404 => ClientError::not_found(resource_for_path(path), envelope.describe(path)),
            409 => ClientError::AgentInUse {
                message: envelope.describe("resource is in use"),
            },
            429 => {
                let from_details = envelope
                    .details
                    .as_ref()
                    .and_then(|d| d.get("retry_after"))
                    .and_then(serde_json::Value::as_f64)
                    .and_then(seconds_to_duration);
                ClientError::RateLimited {
                    retry_after: self.retry_after().or(from_details),
                    rate_limit: self.rate_limit(),
                }
            }
            500..=599 => ClientError::Server {
                status,
                message: envelope.describe("internal server error"),
            },
            _ => ClientError::Api {
                status,
                error_code: envelope.error.clone(),
                message: envelope.describe("unexpected status"),
            },
        };
        Err(err)
    }
}

/// Outcome of a response body streamed to disk.
#[derive(Debug, Clone)]
pub struct DownloadReceipt {
    /// HTTP status code.
    pub status: u16,
    /// Headers with lower-cased names.
    pub headers: BTreeMap<String, String>,
    /// Bytes written to the file.
    pub bytes_written: u64,
}

impl DownloadReceipt {
    /// Parses the rate limit headers, if any are present.
    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        rate_limit_from(&self.headers)
    }
}

fn rate_limit_from(headers: &BTreeMap<String, String>) -> Option<RateLimitInfo> {
    let parse = |name: &str| headers.get(name).and_then(|v| v.trim().parse::<u64>().ok());
    let info = RateLimitInfo {
        limit: parse("x-ratelimit-limit"),
        remaining: parse("x-ratelimit-remaining"),
        reset: parse("x-ratelimit-reset"),
    };
    if info == RateLimitInfo::default() {
        None
    } else {
        Some(info)
    }
}

/// Converts a server-supplied second count. Values too large for a
/// `Duration` saturate so they exceed any retry cap.
fn seconds_to_duration(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

fn resource_for_path(path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["scans", _, "reports", ..] => "report",
        ["scans", _, "results"] => "results",
        ["scans", ..] => "scan",
        ["generators", ..] => "generator",
        ["probes", ..] => "probe category",
        _ => "resource",
    }
}
