//! # garak-sdk
//!
//! An async client for the Garak LLM security-scanning REST API.
//!
//! ## Overview
//!
//! A scan sends adversarial probes to a target model through a generator and
//! records which detectors fired. This crate lets you:
//!
//! - Create, inspect, update and cancel scans
//! - Wait for a scan to finish with timeout, progress callback and cancellation
//! - Fetch pass/fail results and download reports to memory or disk
//! - Discover supported generators and probes, check health and quota
//! - Run many scans concurrently with bounded parallelism
//!
//! Transient failures (network errors, 5xx, 429) are retried with exponential
//! backoff, honouring the server's `Retry-After`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use garak_sdk::{CreateScanRequest, GarakClient, WaitOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GARAK_API_KEY (and optional overrides) from the environment
//!     let client = GarakClient::from_env()?;
//!
//!     let request = CreateScanRequest::new("openai", "gpt-4")
//!         .with_probe_categories(["dan", "encoding"]);
//!     let scan = client.scans().create(request).await?;
//!
//!     let scan_id = scan.single().map(|m| m.scan_id.clone()).unwrap_or_default();
//!     let options = WaitOptions::new()
//!         .with_timeout(Duration::from_secs(1800))
//!         .on_progress(|status| println!("{:.0}%", status.percentage()));
//!     client.scans().wait_for_completion(&scan_id, options).await?;
//!
//!     let results = client.scans().get_results(&scan_id).await?;
//!     println!("security score: {}", results.security_score());
//!
//!     client.reports().download_all(&scan_id, "./reports", None).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Core**: Wire types, request/response envelopes, credentials and errors
//! - **Transport**: The `Transport` seam, the HTTP implementation, retries and a mock
//! - **Client**: Configuration and the shared client handle
//! - **Scans**: Lifecycle operations, polling and batches
//! - **Reports**: Report listing and downloads
//! - **Discovery**: Generators, probes, service info and health
//! - **Audit**: Structured lifecycle events for compliance logging

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod client;
pub mod core;
pub mod discovery;
pub mod reports;
pub mod scans;
pub mod transport;

// Re-export commonly used types at the crate root
pub use crate::core::{
    ApiKey, ClientError, ClientResult, CreateScanRequest, CredentialCarrier, ReportType,
    ScanMetadata, ScanResults, ScanStatus, ScanStatusInfo, ScanUpdate,
};

pub use crate::client::{ClientConfig, GarakClient, GarakClientBuilder};
pub use crate::discovery::DiscoverySnapshot;
pub use crate::scans::{BatchItem, CancelOutcome, CreatedScan, WaitOptions};
pub use crate::transport::{HttpTransport, MockTransport, RetryConfig};

/// Prelude module for convenient imports.
///
/// ```rust
/// use garak_sdk::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{ClientConfig, GarakClient};
    pub use crate::core::{
        ClientError, ClientResult, CreateScanRequest, CredentialCarrier, ReportType,
        ScanMetadata, ScanResults, ScanStatus, ScanStatusInfo, ScanUpdate, Transport,
    };
    pub use crate::scans::{CancelOutcome, CreatedScan, WaitOptions};
    pub use crate::transport::RetryConfig;
}
