//! Scan result and report structures.

use crate::core::error::ClientError;
use crate::core::types::{ReportType, ScanMetadata};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pass/fail counts for one probe or detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassFail {
    /// Attempts that passed.
    #[serde(default)]
    pub passed: u64,
    /// Attempts that failed.
    #[serde(default)]
    pub failed: u64,
}

impl PassFail {
    /// Total attempts, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.passed.saturating_add(self.failed)
    }
}

/// A single failing attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Probe that produced the attempt.
    pub probe: String,
    /// Detector that flagged it.
    #[serde(default)]
    pub detector: Option<String>,
    /// Prompt sent to the model.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Model output.
    #[serde(default)]
    pub output: Option<String>,
}

/// Parsed results of a completed scan.
///
/// Results never change once a scan is terminal, so the client caches them
/// per `scan_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResults {
    /// Scan identifier.
    pub scan_id: String,

    /// Number of attempts executed.
    #[serde(default, alias = "total_prompts")]
    pub total_attempts: u64,

    /// Attempts that passed every detector.
    #[serde(default, alias = "passed_prompts")]
    pub total_passed: u64,

    /// Attempts flagged by at least one detector.
    #[serde(default, alias = "failed_prompts")]
    pub total_failed: u64,

    /// Pass rate (0-100) reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_pass_rate: Option<f64>,

    /// Security score (0-100) reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_score: Option<f64>,

    /// Per-probe counts.
    #[serde(default)]
    pub probe_summary: BTreeMap<String, PassFail>,

    /// Per-detector counts.
    #[serde(default)]
    pub detector_summary: BTreeMap<String, PassFail>,

    /// Failing attempts, if the backend included them.
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
}

impl ScanResults {
    /// Checks the summary counts for internal consistency.
    pub fn validate(&self) -> Result<(), ClientError> {
        let counted = self.total_passed.checked_add(self.total_failed);
        if counted != Some(self.total_attempts) {
            return Err(ClientError::decode(
                format!("results for scan '{}'", self.scan_id),
                format!(
                    "passed ({}) + failed ({}) does not equal total attempts ({})",
                    self.total_passed, self.total_failed, self.total_attempts
                ),
            ));
        }
        for (label, value) in [
            ("overall_pass_rate", self.overall_pass_rate),
            ("security_score", self.security_score),
        ] {
            if let Some(v) = value {
                if !(0.0..=100.0).contains(&v) {
                    return Err(ClientError::decode(
                        format!("results for scan '{}'", self.scan_id),
                        format!("{label} {v} is outside 0-100"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Returns the pass rate (0-100).
    ///
    /// Prefers the backend's `overall_pass_rate`; otherwise computes it from counts.
    /// A scan with no attempts has a pass rate of 100.
    pub fn pass_rate(&self) -> f64 {
        if let Some(rate) = self.overall_pass_rate {
            return rate.clamp(0.0, 100.0);
        }
        if self.total_attempts == 0 {
            return 100.0;
        }
        self.total_passed as f64 * 100.0 / self.total_attempts as f64
    }

    /// Returns the security score: the pass rate rounded to one decimal place.
    pub fn security_score(&self) -> f64 {
        match self.security_score {
            Some(score) => score,
            None => (self.pass_rate() * 10.0).round() / 10.0,
        }
    }

    /// Returns probes that had at least one failing attempt, worst first.
    pub fn failing_probes(&self) -> Vec<(&str, PassFail)> {
        let mut probes: Vec<_> = self
            .probe_summary
            .iter()
            .filter(|(_, counts)| counts.failed > 0)
            .map(|(name, counts)| (name.as_str(), *counts))
            .collect();
        probes.sort_by(|a, b| b.1.failed.cmp(&a.1.failed).then(a.0.cmp(b.0)));
        probes
    }
}

/// Availability of one report artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInfo {
    /// Report type.
    #[serde(rename = "type")]
    pub report_type: ReportType,
    /// Server-side path.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Whether the report can be downloaded.
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// A downloaded report held in memory.
#[derive(Debug, Clone)]
pub struct Report {
    /// Scan the report belongs to.
    pub scan_id: String,
    /// Report type.
    pub report_type: ReportType,
    /// Raw report bytes.
    pub content: Bytes,
}

impl Report {
    /// Size of the report in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Returns the content as UTF-8 text, if valid.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Full scan detail returned by `GET /scans/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanDetail {
    /// Scan metadata.
    pub metadata: ScanMetadata,
    /// Results, once available.
    #[serde(default)]
    pub results: Option<ScanResults>,
    /// Report availability.
    #[serde(default)]
    pub reports: Vec<ReportInfo>,
}
