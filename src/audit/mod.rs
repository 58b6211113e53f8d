//! Structured audit logging of scan lifecycle events.
//!
//! This module provides functions for emitting structured audit events
//! using the `tracing` crate under the `garak_sdk::audit` target. Events can
//! be captured by any tracing subscriber (JSON file, OpenTelemetry, etc.).

mod events;

pub use events::{
    emit_report_downloaded, emit_results_retrieved, emit_scan_cancelled, emit_scan_created,
    emit_scan_finished, emit_status_changed, emit_virtual_scans_created, AuditEvent,
    ScanAuditEvent,
};
