//! Waiting for a scan to reach a terminal status.

use crate::audit;
use crate::core::request::validate_path_segment;
use crate::core::{ClientError, ScanMetadata, ScanStatus, ScanStatusInfo};
use crate::scans::Scans;
use crate::transport::retry::add_jitter;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Callback invoked with every non-terminal status observed while waiting.
pub type ProgressCallback = Arc<dyn Fn(&ScanStatusInfo) + Send + Sync>;

/// Options for [`Scans::wait_for_completion`].
#[derive(Clone)]
pub struct WaitOptions {
    /// Wall-clock limit measured from the start of the wait.
    pub timeout: Duration,

    /// Delay between polls.
    pub poll_interval: Duration,

    /// Fraction of `poll_interval` added as random jitter.
    pub poll_jitter: f64,

    /// Stops the wait when cancelled.
    pub cancel: Option<CancellationToken>,

    /// Called synchronously with every non-terminal status.
    pub on_progress: Option<ProgressCallback>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(10),
            poll_jitter: 0.1,
            cancel: None,
            on_progress: None,
        }
    }
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("poll_jitter", &self.poll_jitter)
            .field("cancel", &self.cancel.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl WaitOptions {
    /// Creates options with defaults (1 hour timeout, 10 second polls).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the poll jitter fraction, clamped to 0.0-1.0.
    pub fn with_poll_jitter(mut self, jitter: f64) -> Self {
        self.poll_jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Sets a cancellation token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets the progress callback.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ScanStatusInfo) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

impl Scans<'_> {
    /// Polls a scan until it reaches a terminal status and returns its final metadata.
    ///
    /// A scan that ends `failed` or `cancelled` is returned normally; inspect
    /// `status` and `failure`. Transient errors are retried by the transport
    /// before they surface here.
    ///
    /// # Errors
    ///
    /// - `ScanTimeout` once `timeout` elapses. No request is issued after the
    ///   deadline; the remote scan keeps running.
    /// - `Cancelled` when the cancel token fires. A poll already in flight is
    ///   allowed to finish first.
    pub async fn wait_for_completion(
        &self,
        scan_id: &str,
        options: WaitOptions,
    ) -> Result<ScanMetadata, ClientError> {
        validate_path_segment("scan_id", scan_id)?;

        let start = Instant::now();
        // Duration::MAX and similar mean "no practical limit"
        let deadline = start
            .checked_add(options.timeout)
            .unwrap_or_else(|| start + FAR_FUTURE);
        let mut last_status: Option<ScanStatus> = None;

        let timed_out = |last: Option<ScanStatus>| ClientError::ScanTimeout {
            scan_id: scan_id.to_string(),
            elapsed: start.elapsed(),
            last_status: last.unwrap_or(ScanStatus::Pending),
        };

        tracing::debug!(
            scan_id = %scan_id,
            timeout_secs = options.timeout.as_secs_f64(),
            poll_interval_ms = options.poll_interval.as_millis() as u64,
            "Waiting for scan completion"
        );

        loop {
            if options.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let status = match before(deadline, self.get_status(scan_id)).await {
                Some(result) => result?,
                None => return Err(timed_out(last_status)),
            };

            if last_status != Some(status.status) {
                audit::emit_status_changed(scan_id, last_status, status.status);
            }
            last_status = Some(status.status);

            if status.is_terminal() {
                let detail = match before(deadline, self.get(scan_id)).await {
                    Some(result) => result?,
                    None => return Err(timed_out(last_status)),
                };
                audit::emit_scan_finished(&detail.metadata);
                return Ok(detail.metadata);
            }

            if let Some(callback) = &options.on_progress {
                callback(&status);
            }

            tracing::debug!(
                scan_id = %scan_id,
                status = %status.status,
                percentage = status.percentage(),
                "Scan still in progress"
            );

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out(last_status));
            }
            let pause = add_jitter(options.poll_interval, options.poll_jitter).min(deadline - now);

            match &options.cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => return Err(ClientError::Cancelled),
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
                None => tokio::time::sleep(pause).await,
            }

            if Instant::now() >= deadline {
                return Err(timed_out(last_status));
            }
        }
    }
}

/// Deadline used when the requested timeout cannot be represented.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Runs `future` unless `deadline` passes first.
async fn before<F: Future>(deadline: Instant, future: F) -> Option<F::Output> {
    tokio::time::timeout_at(deadline, future).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::garak::test_support::*;
    use crate::transport::MockReply;
    use serde_json::json;
    use std::sync::Mutex;

    const STATUS: &str = "/scans/scan-1/status";

    fn fast() -> WaitOptions {
        WaitOptions::new()
            .with_poll_interval(Duration::from_secs(2))
            .with_poll_jitter(0.0)
            .with_timeout(Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_completed_metadata_after_n_polls() {
        let (client, mock) = mock_client();
        mock.on_get(STATUS)
            .ok(status_json("scan-1", "pending", 0.0))
            .ok(status_json("scan-1", "running", 50.0))
            .ok(status_json("scan-1", "completed", 100.0));
        mock.on_get("/scans/scan-1").ok(detail_json("scan-1", "completed"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = fast().on_progress(move |status| {
            sink.lock().unwrap().push((status.status, status.percentage()));
        });

        let metadata = client
            .scans()
            .wait_for_completion("scan-1", options)
            .await
            .unwrap();

        assert_eq!(metadata.status, ScanStatus::Completed);
        assert_eq!(mock.request_count(STATUS), 3);
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(ScanStatus::Pending, 0.0), (ScanStatus::Running, 50.0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scan_is_returned_not_raised() {
        let (client, mock) = mock_client();
        mock.on_get(STATUS).ok(status_json("scan-1", "failed", 30.0));
        let mut detail = detail_json("scan-1", "failed");
        detail["metadata"]["error_message"] = "generator unreachable".into();
        mock.on_get("/scans/scan-1").ok(detail);

        let metadata = client
            .scans()
            .wait_for_completion("scan-1", fast())
            .await
            .unwrap();
        assert_eq!(metadata.status, ScanStatus::Failed);
        assert_eq!(metadata.failure.as_deref(), Some("generator unreachable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stops_polling() {
        let (client, mock) = mock_client();
        mock.on_get(STATUS).ok(status_json("scan-1", "running", 50.0));

        let options = WaitOptions::new()
            .with_poll_interval(Duration::from_secs(3))
            .with_poll_jitter(0.0)
            .with_timeout(Duration::from_secs(10));

        let start = Instant::now();
        let err = client
            .scans()
            .wait_for_completion("scan-1", options)
            .await
            .unwrap_err();

        match err {
            ClientError::ScanTimeout { last_status, elapsed, .. } => {
                assert_eq!(last_status, ScanStatus::Running);
                assert!(elapsed >= Duration::from_secs(10));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(11));
        // polls at 0s, 3s, 6s and 9s; none after the deadline
        assert_eq!(mock.request_count(STATUS), 4);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(mock.request_count(STATUS), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_waits_normally() {
        let (client, mock) = mock_client();
        mock.on_get(STATUS)
            .ok(status_json("scan-1", "running", 40.0))
            .ok(status_json("scan-1", "completed", 100.0));
        mock.on_get("/scans/scan-1").ok(detail_json("scan-1", "completed"));

        let metadata = client
            .scans()
            .wait_for_completion("scan-1", fast().with_timeout(Duration::MAX))
            .await
            .unwrap();
        assert_eq!(metadata.status, ScanStatus::Completed);
        assert_eq!(mock.request_count(STATUS), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cuts_slow_poll() {
        let (client, mock) = mock_client();
        mock.on_get(STATUS).reply(
            MockReply::ok(status_json("scan-1", "running", 10.0))
                .with_latency(Duration::from_secs(30)),
        );

        let err = client
            .scans()
            .wait_for_completion("scan-1", fast().with_timeout(Duration::from_secs(5)))
            .await
            .unwrap_err();
        match err {
            ClientError::ScanTimeout { elapsed, last_status, .. } => {
                assert!(elapsed >= Duration::from_secs(5));
                assert!(elapsed < Duration::from_secs(30));
                assert_eq!(last_status, ScanStatus::Pending);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_does_not_abort_wait() {
        let (client, mock) = mock_client();
        mock.on_get(STATUS)
            .ok(status_json("scan-1", "running", 50.0))
            .reply(MockReply::status(503, json!({"error": "unavailable"})))
            .ok(status_json("scan-1", "completed", 100.0));
        mock.on_get("/scans/scan-1").ok(detail_json("scan-1", "completed"));

        let metadata = client
            .scans()
            .wait_for_completion("scan-1", fast())
            .await
            .unwrap();
        assert_eq!(metadata.status, ScanStatus::Completed);
        assert_eq!(mock.request_count(STATUS), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_surfaces() {
        let (client, mock) = mock_client();
        mock.on_get(STATUS)
            .reply(MockReply::status(404, json!({"error": "scan_not_found"})));

        let err = client
            .scans()
            .wait_for_completion("scan-1", fast())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_token_stops_wait() {
        let (client, mock) = mock_client();
        mock.on_get(STATUS).ok(status_json("scan-1", "running", 50.0));

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = client
            .scans()
            .wait_for_completion("scan-1", fast().with_cancel_token(token))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(6));
        // polls at 0s, 2s and 4s
        assert_eq!(mock.request_count(STATUS), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_token_issues_no_request() {
        let (client, mock) = mock_client();
        let token = CancellationToken::new();
        token.cancel();

        let err = client
            .scans()
            .wait_for_completion("scan-1", fast().with_cancel_token(token))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(mock.total_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_jitter_bounds_interval() {
        let (client, mock) = mock_client();
        mock.on_get(STATUS)
            .ok(status_json("scan-1", "running", 50.0))
            .ok(status_json("scan-1", "completed", 100.0));
        mock.on_get("/scans/scan-1").ok(detail_json("scan-1", "completed"));

        let options = WaitOptions::new()
            .with_poll_interval(Duration::from_secs(10))
            .with_poll_jitter(0.5);
        let start = Instant::now();
        client
            .scans()
            .wait_for_completion("scan-1", options)
            .await
            .unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed <= Duration::from_secs(15));
    }

    #[test]
    fn test_options_debug() {
        let options = WaitOptions::new().on_progress(|_| {});
        let debug = format!("{options:?}");
        assert!(debug.contains("on_progress: true"));
    }
}
