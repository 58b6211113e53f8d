//! Scan lifecycle operations.
//!
//! [`Scans`] covers creating, listing, inspecting, updating and cancelling
//! scans, waiting for them to finish ([`wait`]), fetching results and quota,
//! and running many scans concurrently ([`batch`]).
//!
//! Status moves forward only:
//!
//! ```text
//! pending ──▶ running ──▶ completed | failed | cancelled
//!    └─────────────────────────────────────▶ cancelled
//! ```

pub mod batch;
pub mod wait;

pub use batch::BatchItem;
pub use wait::{ProgressCallback, WaitOptions};

use crate::audit;
use crate::client::GarakClient;
use crate::core::request::validate_path_segment;
use crate::core::{
    ApiRequest, ClientError, CreateScanRequest, ListScansQuery, QuotaResponse, ScanDetail,
    ScanMetadata, ScanPage, ScanResults, ScanStatus, ScanStatusInfo, ScanUpdate, StatusQuery,
};

use serde::Deserialize;
use std::sync::Arc;

/// Result of a create call.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedScan {
    /// One scan was queued.
    Single(ScanMetadata),

    /// The backend fanned the request out into several scans.
    Virtual {
        /// Identifiers of every created scan.
        scan_ids: Vec<String>,
        /// Backend message, if any.
        message: Option<String>,
    },
}

impl CreatedScan {
    /// Returns the identifiers of every created scan.
    pub fn scan_ids(&self) -> Vec<&str> {
        match self {
            Self::Single(metadata) => vec![metadata.scan_id.as_str()],
            Self::Virtual { scan_ids, .. } => scan_ids.iter().map(String::as_str).collect(),
        }
    }

    /// Returns the metadata of a single created scan.
    pub fn single(&self) -> Option<&ScanMetadata> {
        match self {
            Self::Single(metadata) => Some(metadata),
            Self::Virtual { .. } => None,
        }
    }

    /// Consumes `self`, returning the metadata of a single created scan.
    pub fn into_single(self) -> Option<ScanMetadata> {
        match self {
            Self::Single(metadata) => Some(metadata),
            Self::Virtual { .. } => None,
        }
    }

    fn from_response(body: serde_json::Value) -> Result<Self, ClientError> {
        let flagged = |v: &serde_json::Value| {
            v.get("needs_subscription")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        };
        if flagged(&body) || body.get("metadata").is_some_and(flagged) {
            return Err(ClientError::quota_exceeded(
                "Scan quota exceeded; a subscription is required to create more scans",
            ));
        }

        let message = body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        if let Some(scan_ids) = virtual_scan_ids(&body)? {
            return Ok(Self::Virtual { scan_ids, message });
        }

        let metadata = if body.get("metadata").is_some() {
            body["metadata"].clone()
        } else {
            body
        };
        serde_json::from_value(metadata)
            .map(Self::Single)
            .map_err(|e| ClientError::decode("create scan", e))
    }
}

fn virtual_scan_ids(body: &serde_json::Value) -> Result<Option<Vec<String>>, ClientError> {
    let ids: Vec<String> = if let Some(list) = body.get("scan_ids").and_then(|v| v.as_array()) {
        list.iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    } else if let Some(list) = body.get("virtual_scans").and_then(|v| v.as_array()) {
        list.iter()
            .filter_map(|v| {
                v.as_str()
                    .or_else(|| v.get("scan_id").and_then(|id| id.as_str()))
                    .map(str::to_string)
            })
            .collect()
    } else {
        return Ok(None);
    };

    if let Some(count) = body.get("count").and_then(serde_json::Value::as_u64) {
        if count != ids.len() as u64 {
            return Err(ClientError::decode(
                "create scan",
                format!("count {count} does not match {} returned scan IDs", ids.len()),
            ));
        }
    }
    if ids.is_empty() {
        return Err(ClientError::decode("create scan", "virtual scan list is empty"));
    }
    Ok(Some(ids))
}

/// Outcome of a cancel call. Every variant is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The scan was cancelled immediately.
    Cancelled,
    /// A running scan was signalled and will stop shortly.
    CancellationRequested,
    /// The scan had already finished with the given status; nothing changed.
    AlreadyTerminal(ScanStatus),
}

#[derive(Debug, Default, Deserialize)]
struct CancelResponse {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataEnvelope {
    metadata: ScanMetadata,
}

/// Scan lifecycle operations, borrowed from a [`GarakClient`].
#[derive(Debug, Clone, Copy)]
pub struct Scans<'a> {
    client: &'a GarakClient,
}

impl<'a> Scans<'a> {
    pub(crate) fn new(client: &'a GarakClient) -> Self {
        Self { client }
    }

    /// Creates a scan.
    ///
    /// The request is validated locally first; invalid requests never reach
    /// the network. Fails with `QuotaExceeded` when the backend flags the
    /// request as needing a subscription.
    pub async fn create(&self, request: CreateScanRequest) -> Result<CreatedScan, ClientError> {
        request.validate()?;

        tracing::info!(
            generator = %request.generator,
            model_name = %request.model_name,
            probe_categories = ?request.probe_categories,
            "Creating scan"
        );

        let api_request = ApiRequest::post("/scans").with_json(&request)?;
        let body: serde_json::Value = self
            .client
            .execute_json(api_request, "create scan")
            .await?;
        let created = CreatedScan::from_response(body)?;

        match &created {
            CreatedScan::Single(metadata) => audit::emit_scan_created(metadata),
            CreatedScan::Virtual { scan_ids, .. } => audit::emit_virtual_scans_created(scan_ids),
        }
        Ok(created)
    }

    /// Lists scans page by page.
    pub async fn list(&self, query: ListScansQuery) -> Result<ScanPage, ClientError> {
        query.validate()?;
        let request = query.apply(ApiRequest::get("/scans"));
        self.client.execute_json(request, "list scans").await
    }

    /// Returns full scan detail, including results and report availability once present.
    pub async fn get(&self, scan_id: &str) -> Result<ScanDetail, ClientError> {
        validate_path_segment("scan_id", scan_id)?;
        self.client
            .execute_json(ApiRequest::get(format!("/scans/{scan_id}")), "scan detail")
            .await
    }

    /// Polls the scan's status once. Never cached.
    pub async fn get_status(&self, scan_id: &str) -> Result<ScanStatusInfo, ClientError> {
        self.get_status_with(scan_id, StatusQuery::new()).await
    }

    /// Polls the scan's status once, optionally including output lines.
    pub async fn get_status_with(
        &self,
        scan_id: &str,
        query: StatusQuery,
    ) -> Result<ScanStatusInfo, ClientError> {
        validate_path_segment("scan_id", scan_id)?;
        let request = query.apply(ApiRequest::get(format!("/scans/{scan_id}/status")));
        self.client.execute_json(request, "scan status").await
    }

    /// Updates a scan's name or description.
    pub async fn update(
        &self,
        scan_id: &str,
        update: ScanUpdate,
    ) -> Result<ScanMetadata, ClientError> {
        validate_path_segment("scan_id", scan_id)?;
        if update.is_empty() {
            return Err(ClientError::validation(
                "update must change the name or the description",
            ));
        }
        let request = ApiRequest::patch(format!("/scans/{scan_id}")).with_json(&update)?;
        let envelope: MetadataEnvelope = self.client.execute_json(request, "update scan").await?;
        Ok(envelope.metadata)
    }

    /// Cancels a scan.
    ///
    /// Idempotent: cancelling a scan that already finished returns
    /// [`CancelOutcome::AlreadyTerminal`] instead of an error, since cancel
    /// races with natural completion.
    pub async fn cancel(&self, scan_id: &str) -> Result<CancelOutcome, ClientError> {
        validate_path_segment("scan_id", scan_id)?;
        let request = ApiRequest::delete(format!("/scans/{scan_id}"));

        let outcome = match self.client.execute(request).await {
            Ok(response) => {
                let body: CancelResponse = if response.body.is_empty() {
                    CancelResponse::default()
                } else {
                    response.json("cancel scan")?
                };
                match body.status.as_deref() {
                    None | Some("cancelled") | Some("canceled") => CancelOutcome::Cancelled,
                    Some("cancellation_requested") => CancelOutcome::CancellationRequested,
                    Some(other) => match other.parse::<ScanStatus>() {
                        Ok(status) if status.is_terminal() => CancelOutcome::AlreadyTerminal(status),
                        _ => CancelOutcome::CancellationRequested,
                    },
                }
            }
            Err(e) if matches!(e.status_code(), Some(400) | Some(409)) => {
                let status = self.get_status(scan_id).await?;
                if !status.is_terminal() {
                    return Err(e);
                }
                tracing::debug!(
                    scan_id = %scan_id,
                    status = %status.status,
                    "Cancel rejected for a finished scan"
                );
                CancelOutcome::AlreadyTerminal(status.status)
            }
            Err(e) => return Err(e),
        };

        audit::emit_scan_cancelled(scan_id, &outcome);
        Ok(outcome)
    }

    /// Returns the results of a completed scan.
    ///
    /// Results are cached per scan once fetched. Fails with
    /// `ScanNotCompleted` for any status other than `completed`; partial
    /// results are never read.
    pub async fn get_results(&self, scan_id: &str) -> Result<Arc<ScanResults>, ClientError> {
        validate_path_segment("scan_id", scan_id)?;
        if let Some(results) = self.client.cached_results(scan_id) {
            tracing::trace!(scan_id = %scan_id, "Results served from cache");
            return Ok(results);
        }

        let status = self.get_status(scan_id).await?;
        if status.status != ScanStatus::Completed {
            return Err(ClientError::ScanNotCompleted {
                scan_id: scan_id.to_string(),
                status: status.status,
            });
        }

        let results: ScanResults = self
            .client
            .execute_json(
                ApiRequest::get(format!("/scans/{scan_id}/results")),
                "scan results",
            )
            .await?;
        results.validate()?;

        let results = Arc::new(results);
        self.client.cache_results(scan_id, Arc::clone(&results));
        audit::emit_results_retrieved(&results);
        Ok(results)
    }

    /// Returns the caller's scan quota. Never cached.
    pub async fn get_quota(&self) -> Result<QuotaResponse, ClientError> {
        self.client
            .execute_json(ApiRequest::get("/scans/quota"), "scan quota")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::garak::test_support::*;
    use crate::core::HttpMethod;
    use crate::transport::MockReply;
    use serde_json::json;

    fn results_json(scan_id: &str) -> serde_json::Value {
        json!({
            "scan_id": scan_id,
            "total_prompts": 100,
            "passed_prompts": 85,
            "failed_prompts": 15,
            "overall_pass_rate": 85.0,
            "probe_summary": {"dan.Dan_11_0": {"passed": 45, "failed": 5}}
        })
    }

    #[tokio::test]
    async fn test_create_scan() {
        let (client, mock) = mock_client();
        mock.on_post("/scans").reply(MockReply::status(
            201,
            json!({
                "scan_id": "scan-1",
                "message": "Scan created successfully with ID: scan-1",
                "metadata": metadata_json("scan-1", "pending")
            }),
        ));
        mock.on_get("/scans/scan-1/status")
            .ok(status_json("scan-1", "pending", 0.0));

        let request = CreateScanRequest::new("openai", "gpt-3.5-turbo").with_probe_categories(["dan"]);
        let created = client.scans().create(request).await.unwrap();
        let metadata = created.single().unwrap();
        assert_eq!(metadata.scan_id, "scan-1");
        assert_eq!(metadata.status, ScanStatus::Pending);

        let body = mock.last_request().unwrap().body.unwrap();
        assert_eq!(body["generator"], "openai");
        assert_eq!(body["probe_categories"], json!(["dan"]));

        let status = client.scans().get_status("scan-1").await.unwrap();
        assert_eq!(status.status, ScanStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_validates_locally() {
        let (client, mock) = mock_client();
        let err = client
            .scans()
            .create(CreateScanRequest::new("", "gpt-4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
        assert_eq!(mock.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_create_quota_exceeded() {
        let (client, mock) = mock_client();
        mock.on_post("/scans").reply(MockReply::status(
            201,
            json!({
                "scan_id": "scan-1",
                "metadata": {"needs_subscription": true},
                "needs_subscription": true
            }),
        ));

        let err = client
            .scans()
            .create(CreateScanRequest::new("openai", "gpt-4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::QuotaExceeded { .. }));
        assert!(err.to_string().to_lowercase().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_create_virtual_scans() {
        let (client, mock) = mock_client();
        mock.on_post("/scans").reply(MockReply::status(
            201,
            json!({
                "message": "Created 2 scans from cached alternatives",
                "virtual_scans": [{"scan_id": "v-1"}, {"scan_id": "v-2"}],
                "count": 2
            }),
        ));

        let created = client
            .scans()
            .create(CreateScanRequest::new("openai", "gpt-4"))
            .await
            .unwrap();
        assert_eq!(created.scan_ids(), vec!["v-1", "v-2"]);
        assert!(created.single().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_missing_required_fields() {
        let (client, mock) = mock_client();
        mock.on_post("/scans").reply(MockReply::status(
            201,
            json!({"scan_id": "scan-1", "metadata": {"scan_id": "scan-1", "status": "pending"}}),
        ));

        let err = client
            .scans()
            .create(CreateScanRequest::new("openai", "gpt-4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_list_scans() {
        let (client, mock) = mock_client();
        mock.on_get("/scans").ok(json!({
            "scans": [metadata_json("scan-1", "completed")],
            "total": 100,
            "page": 2,
            "per_page": 10,
            "has_next": true
        }));

        let page = client
            .scans()
            .list(ListScansQuery::new().with_page(2).with_per_page(10))
            .await
            .unwrap();
        assert_eq!(page.page, 2);
        assert!(page.has_next);
        assert_eq!(page.scans[0].status, ScanStatus::Completed);

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.query_param("page"), Some("2"));
        assert_eq!(sent.query_param("per_page"), Some("10"));
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let (client, mock) = mock_client();
        mock.on_get("/scans/missing")
            .reply(MockReply::status(404, json!({"error": "scan_not_found"})));

        let err = client.scans().get("missing").await.unwrap_err();
        match err {
            ClientError::NotFound { resource, .. } => assert_eq!(resource, "scan"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_status_with_output() {
        let (client, mock) = mock_client();
        mock.on_get("/scans/scan-1/status").ok(json!({
            "scan_id": "scan-1",
            "status": "running",
            "progress": {"completed_items": 5, "total_items": 10, "progress_percent": 50.0},
            "output": "line 10\nline 11",
            "output_metadata": {"total_lines": 200, "start_line": 10, "returned_lines": 2}
        }));

        let status = client
            .scans()
            .get_status_with("scan-1", StatusQuery::with_output(Some(10), Some(2)))
            .await
            .unwrap();
        assert_eq!(status.percentage(), 50.0);
        assert_eq!(status.output_metadata.unwrap().returned_lines, 2);
        assert_eq!(
            mock.last_request().unwrap().query_param("include_output"),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_update_scan() {
        let (client, mock) = mock_client();
        let mut metadata = metadata_json("scan-1", "completed");
        metadata["name"] = "Updated Name".into();
        mock.on_patch("/scans/scan-1")
            .ok(json!({"message": "Scan updated successfully", "metadata": metadata}));

        let updated = client
            .scans()
            .update("scan-1", ScanUpdate::new().with_name("Updated Name"))
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Updated Name"));
        let body = mock.last_request().unwrap().body.unwrap();
        assert_eq!(body, json!({"name": "Updated Name"}));

        let err = client.scans().update("scan-1", ScanUpdate::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_cancel_running_scan() {
        let (client, mock) = mock_client();
        mock.on_delete("/scans/scan-1").ok(json!({
            "message": "Cancellation requested for scan scan-1",
            "status": "cancellation_requested"
        }));

        let outcome = client.scans().cancel("scan-1").await.unwrap();
        assert_eq!(outcome, CancelOutcome::CancellationRequested);
    }

    #[tokio::test]
    async fn test_cancel_completed_scan_is_noop_success() {
        let (client, mock) = mock_client();
        mock.on_delete("/scans/scan-1").reply(MockReply::status(
            400,
            json!({"error": "invalid_state", "message": "Scan already completed"}),
        ));
        mock.on_get("/scans/scan-1/status")
            .ok(status_json("scan-1", "completed", 100.0));

        let outcome = client.scans().cancel("scan-1").await.unwrap();
        assert_eq!(outcome, CancelOutcome::AlreadyTerminal(ScanStatus::Completed));

        // a second cancel behaves the same
        let outcome = client.scans().cancel("scan-1").await.unwrap();
        assert_eq!(outcome, CancelOutcome::AlreadyTerminal(ScanStatus::Completed));
    }

    #[tokio::test]
    async fn test_cancel_conflict_on_active_scan_surfaces() {
        let (client, mock) = mock_client();
        mock.on_delete("/scans/scan-1")
            .reply(MockReply::status(409, json!({"error": "conflict"})));
        mock.on_get("/scans/scan-1/status")
            .ok(status_json("scan-1", "running", 10.0));

        let err = client.scans().cancel("scan-1").await.unwrap_err();
        assert!(matches!(err, ClientError::AgentInUse { .. }));
    }

    #[tokio::test]
    async fn test_get_results_requires_completed() {
        let (client, mock) = mock_client();
        mock.on_get("/scans/scan-1/status")
            .ok(status_json("scan-1", "running", 50.0));

        let err = client.scans().get_results("scan-1").await.unwrap_err();
        match err {
            ClientError::ScanNotCompleted { status, .. } => assert_eq!(status, ScanStatus::Running),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(mock.request_count("/scans/scan-1/results"), 0);
    }

    #[tokio::test]
    async fn test_get_results_cached() {
        let (client, mock) = mock_client();
        mock.on_get("/scans/scan-1/status")
            .ok(status_json("scan-1", "completed", 100.0));
        mock.on_get("/scans/scan-1/results").ok(results_json("scan-1"));

        let results = client.scans().get_results("scan-1").await.unwrap();
        assert_eq!(results.total_passed + results.total_failed, results.total_attempts);
        assert_eq!(results.security_score(), 85.0);

        let again = client.scans().get_results("scan-1").await.unwrap();
        assert!(Arc::ptr_eq(&results, &again));
        assert_eq!(mock.request_count_for(HttpMethod::Get, "/scans/scan-1/results"), 1);
        assert_eq!(mock.request_count("/scans/scan-1/status"), 1);
    }

    #[tokio::test]
    async fn test_get_results_rejects_inconsistent_counts() {
        let (client, mock) = mock_client();
        mock.on_get("/scans/scan-1/status")
            .ok(status_json("scan-1", "completed", 100.0));
        mock.on_get("/scans/scan-1/results").ok(json!({
            "scan_id": "scan-1",
            "total_prompts": 100,
            "passed_prompts": 90,
            "failed_prompts": 15
        }));

        let err = client.scans().get_results("scan-1").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_quota_never_cached() {
        let (client, mock) = mock_client();
        mock.on_get("/scans/quota").ok(json!({
            "quota_status": {
                "total_scans_used": 5,
                "total_scans_limit": 10,
                "free_scans_used": 1,
                "free_scans_limit": 2
            },
            "message": "Quota information retrieved successfully"
        }));

        let quota = client.scans().get_quota().await.unwrap();
        assert_eq!(quota.quota_status.total_scans_limit, 10);
        assert_eq!(quota.quota_status.free_scans_limit, 2);
        client.scans().get_quota().await.unwrap();
        assert_eq!(mock.request_count("/scans/quota"), 2);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_scan_ids() {
        let (client, mock) = mock_client();
        assert!(client.scans().get("../admin").await.is_err());
        assert!(client.scans().cancel("").await.is_err());
        assert_eq!(mock.total_requests(), 0);
    }
}
