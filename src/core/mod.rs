//! Core types and traits for the garak-sdk library.
//!
//! - [`types`] - Scan status, progress, metadata and report types
//! - [`result`] - Scan results, report records and scan detail
//! - [`catalog`] - Generator, probe, service and quota records
//! - [`request`] / [`response`] - Transport envelopes and typed request bodies
//! - [`credential`] - API keys and credential carriers
//! - [`traits`] - The `Transport` trait
//! - [`error`] - Structured error types

pub mod catalog;
pub mod credential;
pub mod error;
pub mod request;
pub mod response;
pub mod result;
pub mod traits;
pub mod types;

pub use catalog::{
    ApiInfo, GeneratorInfo, HealthStatus, ProbeCategory, ProbeInfo, QuotaResponse, QuotaStatus,
};
pub use credential::{ApiKey, Credential, CredentialCarrier};
pub use error::{ClientError, ClientResult};
pub use request::{
    ApiRequest, CreateScanRequest, HttpMethod, ListScansQuery, ScanUpdate, StatusQuery,
};
pub use response::{ApiResponse, DownloadReceipt, ErrorEnvelope, RateLimitInfo};
pub use result::{FailureRecord, PassFail, Report, ReportInfo, ScanDetail, ScanResults};
pub use traits::{ArcTransport, Transport};
pub use types::{
    OutputMetadata, ReportType, ScanMetadata, ScanPage, ScanProgress, ScanStatus, ScanStatusInfo,
};
