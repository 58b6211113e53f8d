//! Core scan records used throughout the garak-sdk library.
//!
//! These mirror the backend's JSON schemas. Required fields are enforced on
//! decode; a response missing `scan_id`, `status`, `generator`, `model_name`
//! or `created_at` is rejected rather than defaulted.

use crate::core::error::ClientError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a scan.
///
/// Scans move forward only: `pending → running → {completed, failed, cancelled}`,
/// with `pending → cancelled` allowed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Queued, not yet started.
    Pending,
    /// Probes are executing.
    Running,
    /// Finished successfully; results and reports are available.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl ScanStatus {
    /// Returns `true` for `completed`, `failed` and `cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed | Self::Cancelled => 2,
        }
    }

    /// Returns `true` if moving from `self` to `next` respects forward-only ordering.
    ///
    /// Staying in the same status is allowed; terminal statuses never change.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(ClientError::decode(
                "scan status",
                format!("unknown status '{other}'"),
            )),
        }
    }
}

/// Type of downloadable report artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// Aggregated JSON report.
    Json,
    /// Raw JSONL attempt log.
    Jsonl,
    /// Rendered HTML report.
    Html,
    /// JSONL log of failing attempts only.
    #[serde(alias = "hitlog")]
    Hits,
}

impl ReportType {
    /// Every report type the backend can produce.
    pub const ALL: [ReportType; 4] = [Self::Json, Self::Jsonl, Self::Html, Self::Hits];

    /// Returns the wire name used in report URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Jsonl => "jsonl",
            Self::Html => "html",
            Self::Hits => "hits",
        }
    }

    /// Returns the local file name used when saving this report for a scan.
    pub fn file_name(&self, scan_id: &str) -> String {
        match self {
            Self::Json => format!("{scan_id}.report.json"),
            Self::Jsonl => format!("{scan_id}.report.jsonl"),
            Self::Html => format!("{scan_id}.report.html"),
            Self::Hits => format!("{scan_id}.hitlog.jsonl"),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" => Ok(Self::Jsonl),
            "html" => Ok(Self::Html),
            "hits" | "hitlog" => Ok(Self::Hits),
            _ => Err(ClientError::InvalidReportType {
                report_type: s.to_string(),
            }),
        }
    }
}

/// Progress of a running scan, as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Items (attempts) completed so far.
    #[serde(default, alias = "current")]
    pub completed_items: u64,

    /// Total items scheduled.
    #[serde(default, alias = "total")]
    pub total_items: u64,

    /// Completion percentage (0-100), if the backend sent one.
    #[serde(default, alias = "progress_percent", skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,

    /// Estimated seconds remaining.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_remaining: Option<f64>,

    /// Free-form progress message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScanProgress {
    /// Creates a progress record from item counts.
    pub fn new(completed_items: u64, total_items: u64) -> Self {
        Self {
            completed_items,
            total_items,
            ..Self::default()
        }
    }

    /// Returns the completion percentage clamped to 0-100.
    ///
    /// Uses the backend's value when present, otherwise derives it from item counts.
    pub fn percentage(&self) -> f64 {
        let raw = match self.percentage {
            Some(p) => p,
            None if self.total_items == 0 => 0.0,
            None => self.completed_items.min(self.total_items) as f64 * 100.0
                / self.total_items as f64,
        };
        raw.clamp(0.0, 100.0)
    }
}

/// Metadata describing a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    /// Server-assigned scan identifier.
    pub scan_id: String,

    /// Current lifecycle status.
    pub status: ScanStatus,

    /// Generator (model backend adapter) being scanned.
    pub generator: String,

    /// Target model name.
    pub model_name: String,

    /// Probe categories requested.
    #[serde(default)]
    pub probe_categories: Vec<String>,

    /// Individual probes requested.
    #[serde(default)]
    pub probes: Vec<String>,

    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When the scan was created.
    pub created_at: DateTime<Utc>,

    /// When execution started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the scan reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Progress while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ScanProgress>,

    /// Failure reason for failed scans.
    #[serde(default, alias = "error_message", skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// Owner of the scan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,

    /// Whether the scan consumed a free-tier slot.
    #[serde(default)]
    pub use_free_tier: bool,

    /// Whether the caller must subscribe before the scan can run.
    #[serde(default)]
    pub needs_subscription: bool,
}

impl ScanMetadata {
    /// Returns `true` if the scan has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns progress only while the scan is running.
    pub fn active_progress(&self) -> Option<&ScanProgress> {
        match self.status {
            ScanStatus::Running => self.progress.as_ref(),
            _ => None,
        }
    }

    /// Returns the wall-clock run time, if both start and completion are known.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Pagination details of returned output lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputMetadata {
    /// Total lines of output available.
    #[serde(default)]
    pub total_lines: u64,
    /// First line returned.
    #[serde(default)]
    pub start_line: u64,
    /// Number of lines returned.
    #[serde(default)]
    pub returned_lines: u64,
}

/// Lightweight status record returned by `GET /scans/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStatusInfo {
    /// Scan identifier.
    pub scan_id: String,

    /// Current status.
    pub status: ScanStatus,

    /// Progress while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ScanProgress>,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Scan output log, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Pagination of `output`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_metadata: Option<OutputMetadata>,
}

impl ScanStatusInfo {
    /// Returns `true` if the scan has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the completion percentage, or 0 when no progress was reported.
    pub fn percentage(&self) -> f64 {
        self.progress.as_ref().map(ScanProgress::percentage).unwrap_or(0.0)
    }
}

/// One page of `GET /scans`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPage {
    /// Scans on this page.
    pub scans: Vec<ScanMetadata>,
    /// Total matching scans.
    pub total: u64,
    /// Page number (1-based).
    pub page: u32,
    /// Page size.
    pub per_page: u32,
    /// Whether another page follows.
    #[serde(default)]
    pub has_next: bool,
}
