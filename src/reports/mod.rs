//! Report listing and downloads.
//!
//! Reports are never cached; each download fetches fresh bytes.

use crate::audit;
use crate::client::GarakClient;
use crate::core::request::validate_path_segment;
use crate::core::{ApiRequest, ClientError, Report, ReportInfo, ReportType};
use crate::transport::http::API_PREFIX;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Values accepted where a report type is expected.
///
/// Strings are parsed before any request is made; unknown names fail with
/// `InvalidReportType`.
pub trait IntoReportType {
    /// Converts `self` into a [`ReportType`].
    fn into_report_type(self) -> Result<ReportType, ClientError>;
}

impl IntoReportType for ReportType {
    fn into_report_type(self) -> Result<ReportType, ClientError> {
        Ok(self)
    }
}

impl IntoReportType for &str {
    fn into_report_type(self) -> Result<ReportType, ClientError> {
        self.parse()
    }
}

impl IntoReportType for String {
    fn into_report_type(self) -> Result<ReportType, ClientError> {
        self.parse()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReportList {
    Wrapped { reports: Vec<ReportInfo> },
    Bare(Vec<ReportInfo>),
}

/// Per-type outcome of [`Reports::download_all`].
pub type DownloadOutcomes = BTreeMap<ReportType, Result<PathBuf, ClientError>>;

/// Report operations, borrowed from a [`GarakClient`].
#[derive(Debug, Clone, Copy)]
pub struct Reports<'a> {
    client: &'a GarakClient,
}

impl<'a> Reports<'a> {
    pub(crate) fn new(client: &'a GarakClient) -> Self {
        Self { client }
    }

    /// Lists the reports of a scan and whether each is available.
    pub async fn list(&self, scan_id: &str) -> Result<Vec<ReportInfo>, ClientError> {
        validate_path_segment("scan_id", scan_id)?;
        let list: ReportList = self
            .client
            .execute_json(
                ApiRequest::get(format!("/scans/{scan_id}/reports")),
                "report list",
            )
            .await?;
        Ok(match list {
            ReportList::Wrapped { reports } | ReportList::Bare(reports) => reports,
        })
    }

    /// Downloads a report into memory.
    ///
    /// Fails with `NotFound` if the scan produced no report of this type.
    pub async fn download(
        &self,
        scan_id: &str,
        report_type: impl IntoReportType,
    ) -> Result<Report, ClientError> {
        let report_type = report_type.into_report_type()?;
        validate_path_segment("scan_id", scan_id)?;

        let response = self.client.execute(report_request(scan_id, report_type)).await?;
        audit::emit_report_downloaded(scan_id, report_type, response.body.len() as u64, None);

        Ok(Report {
            scan_id: scan_id.to_string(),
            report_type,
            content: response.body,
        })
    }

    /// Streams a report to `path`.
    ///
    /// Refuses to replace an existing file unless `overwrite` is set. The body
    /// is written to a `.part` file first and renamed into place, so `path`
    /// never holds a partial report.
    pub async fn download_to(
        &self,
        scan_id: &str,
        report_type: impl IntoReportType,
        path: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<PathBuf, ClientError> {
        let report_type = report_type.into_report_type()?;
        validate_path_segment("scan_id", scan_id)?;
        let path = path.as_ref().to_path_buf();

        if !overwrite && tokio::fs::try_exists(&path).await? {
            return Err(ClientError::FileExists { path });
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut partial = path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        let receipt = match self
            .client
            .download_to(report_request(scan_id, report_type), &partial)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&partial, &path).await?;

        audit::emit_report_downloaded(scan_id, report_type, receipt.bytes_written, Some(&path));
        Ok(path)
    }

    /// Downloads several report types into `dir`.
    ///
    /// Best effort: every requested type is attempted and failures are
    /// collected per type. `None` requests every known type. Files are named
    /// after [`ReportType::file_name`] and existing files are replaced.
    pub async fn download_all(
        &self,
        scan_id: &str,
        dir: impl AsRef<Path>,
        types: Option<&[ReportType]>,
    ) -> Result<DownloadOutcomes, ClientError> {
        validate_path_segment("scan_id", scan_id)?;
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let types = types.unwrap_or(&ReportType::ALL);
        let mut outcomes = DownloadOutcomes::new();

        for &report_type in types {
            let target = dir.join(report_type.file_name(scan_id));
            let outcome = self.download_to(scan_id, report_type, target, true).await;
            if let Err(e) = &outcome {
                tracing::warn!(
                    scan_id = %scan_id,
                    report_type = %report_type,
                    error = %e,
                    "Report download failed"
                );
            }
            outcomes.insert(report_type, outcome);
        }

        let succeeded = outcomes.values().filter(|o| o.is_ok()).count();
        tracing::info!(
            scan_id = %scan_id,
            requested = outcomes.len(),
            succeeded = succeeded,
            "Report batch download finished"
        );
        Ok(outcomes)
    }

    /// Returns the absolute URL of a report, for use outside the client.
    ///
    /// The URL carries no credentials.
    pub fn report_url(
        &self,
        scan_id: &str,
        report_type: impl IntoReportType,
    ) -> Result<String, ClientError> {
        let report_type = report_type.into_report_type()?;
        validate_path_segment("scan_id", scan_id)?;
        Ok(format!(
            "{}{}/scans/{}/reports/{}",
            self.client.config().base_url,
            API_PREFIX,
            scan_id,
            report_type
        ))
    }
}

fn report_request(scan_id: &str, report_type: ReportType) -> ApiRequest {
    ApiRequest::get(format!("/scans/{scan_id}/reports/{report_type}"))
        .with_header("Accept", "*/*")
}
