//! Audit event types and emission functions.

use crate::core::{ReportType, ScanMetadata, ScanResults, ScanStatus};
use crate::scans::CancelOutcome;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit record of a scan reaching a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAuditEvent {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// Scan identifier.
    pub scan_id: String,

    /// Final status.
    pub status: ScanStatus,

    /// Generator that was scanned.
    pub generator: String,

    /// Target model.
    pub model_name: String,

    /// Probe categories requested.
    pub probe_categories: Vec<String>,

    /// Wall-clock run time in seconds, if both timestamps are known.
    pub duration_secs: Option<i64>,

    /// Failure reason for failed scans.
    pub failure: Option<String>,
}

impl From<&ScanMetadata> for ScanAuditEvent {
    fn from(metadata: &ScanMetadata) -> Self {
        Self {
            timestamp: Utc::now(),
            scan_id: metadata.scan_id.clone(),
            status: metadata.status,
            generator: metadata.generator.clone(),
            model_name: metadata.model_name.clone(),
            probe_categories: metadata.probe_categories.clone(),
            duration_secs: metadata.duration().map(|d| d.num_seconds()),
            failure: metadata.failure.clone(),
        }
    }
}

impl AuditEvent for ScanAuditEvent {
    fn event_type(&self) -> &'static str {
        "scan_finished"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a newly created scan.
pub fn emit_scan_created(metadata: &ScanMetadata) {
    tracing::info!(
        target: "garak_sdk::audit",
        event_type = "scan_created",
        scan_id = %metadata.scan_id,
        generator = %metadata.generator,
        model_name = %metadata.model_name,
        probe_categories = ?metadata.probe_categories,
        probe_count = metadata.probes.len(),
        use_free_tier = metadata.use_free_tier,
        "Scan created"
    );
}

/// Emits an audit event for a create call that fanned out into several scans.
pub fn emit_virtual_scans_created(scan_ids: &[String]) {
    tracing::info!(
        target: "garak_sdk::audit",
        event_type = "virtual_scans_created",
        scan_ids = ?scan_ids,
        count = scan_ids.len(),
        "Virtual scans created"
    );
}

/// Emits an audit event when a polled scan changes status.
pub fn emit_status_changed(scan_id: &str, from: Option<ScanStatus>, to: ScanStatus) {
    tracing::info!(
        target: "garak_sdk::audit",
        event_type = "scan_status_changed",
        scan_id = %scan_id,
        from = ?from.map(|s| s.as_str()),
        to = %to,
        "Scan status changed"
    );
}

/// Emits an audit event for a scan that reached a terminal status.
pub fn emit_scan_finished(metadata: &ScanMetadata) {
    let event = ScanAuditEvent::from(metadata);
    tracing::info!(
        target: "garak_sdk::audit",
        event_type = event.event_type(),
        scan_id = %event.scan_id,
        status = %event.status,
        generator = %event.generator,
        model_name = %event.model_name,
        duration_secs = ?event.duration_secs,
        failure = ?event.failure,
        "Scan finished"
    );
}

/// Emits an audit event for a cancel call.
pub fn emit_scan_cancelled(scan_id: &str, outcome: &CancelOutcome) {
    tracing::info!(
        target: "garak_sdk::audit",
        event_type = "scan_cancelled",
        scan_id = %scan_id,
        outcome = ?outcome,
        "Scan cancellation processed"
    );
}

/// Emits an audit event for retrieved results.
pub fn emit_results_retrieved(results: &ScanResults) {
    tracing::info!(
        target: "garak_sdk::audit",
        event_type = "results_retrieved",
        scan_id = %results.scan_id,
        total_attempts = results.total_attempts,
        total_failed = results.total_failed,
        security_score = results.security_score(),
        "Scan results retrieved"
    );
}

/// Emits an audit event for a downloaded report.
pub fn emit_report_downloaded(
    scan_id: &str,
    report_type: ReportType,
    bytes: u64,
    path: Option<&Path>,
) {
    tracing::info!(
        target: "garak_sdk::audit",
        event_type = "report_downloaded",
        scan_id = %scan_id,
        report_type = %report_type,
        bytes = bytes,
        path = ?path,
        "Report downloaded"
    );
}
