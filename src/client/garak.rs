//! The Garak API client.

use crate::client::config::ClientConfig;
use crate::core::{
    ApiRequest, ApiResponse, ArcTransport, ClientError, Credential, DownloadReceipt, HttpMethod,
    RateLimitInfo, ScanResults, Transport,
};
use crate::discovery::{Discovery, DiscoveryCache};
use crate::reports::Reports;
use crate::scans::Scans;
use crate::transport::{HttpTransport, RetryingTransport};

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Builder for creating a [`GarakClient`].
#[derive(Default)]
pub struct GarakClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<ArcTransport>,
}

impl GarakClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the HTTP transport, e.g. with a
    /// [`MockTransport`](crate::transport::MockTransport).
    ///
    /// The transport is still wrapped with the configured retry policy.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Builds the client.
    ///
    /// Falls back to [`ClientConfig::from_env`] when no configuration was given.
    pub fn build(self) -> Result<GarakClient, ClientError> {
        let config = match self.config {
            Some(config) => config,
            None => ClientConfig::from_env()?,
        };

        let base: ArcTransport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                config.base_url.clone(),
                config.timeout,
                config.verify_ssl,
            )?),
        };
        let transport: ArcTransport = Arc::new(RetryingTransport::new(base, config.retry.clone()));

        tracing::debug!(
            api_key = %config.api_key.prefix(),
            base_url = %config.base_url,
            transport = transport.name(),
            "Created Garak client"
        );

        Ok(GarakClient {
            inner: Arc::new(ClientInner {
                credential: Credential::new(config.api_key.clone(), config.carrier.clone()),
                config,
                transport,
                results: RwLock::new(HashMap::new()),
                discovery: DiscoveryCache::default(),
                last_rate_limit: RwLock::new(None),
            }),
        })
    }
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    credential: Credential,
    transport: ArcTransport,
    results: RwLock<HashMap<String, Arc<ScanResults>>>,
    discovery: DiscoveryCache,
    last_rate_limit: RwLock<Option<RateLimitInfo>>,
}

/// Client for the Garak security-scanning API.
///
/// Cheap to clone; clones share the transport and caches. Operations are
/// grouped by resource:
///
/// - [`scans`](Self::scans) - scan lifecycle, results and quota
/// - [`reports`](Self::reports) - report listing and downloads
/// - [`discovery`](Self::discovery) - generators, probes, API info and health
///
/// # Examples
///
/// ```rust,ignore
/// use garak_sdk::{ClientConfig, CreateScanRequest, GarakClient, WaitOptions};
///
/// let client = GarakClient::new(ClientConfig::from_env()?)?;
/// let scan = client
///     .scans()
///     .create(CreateScanRequest::new("openai", "gpt-4").with_probe_categories(["dan"]))
///     .await?
///     .into_single()?;
/// let finished = client.scans().wait_for_completion(&scan.scan_id, WaitOptions::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct GarakClient {
    inner: Arc<ClientInner>,
}

impl GarakClient {
    /// Creates a client over HTTP with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        GarakClientBuilder::new().config(config).build()
    }

    /// Creates a client from environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Creates a new builder.
    pub fn builder() -> GarakClientBuilder {
        GarakClientBuilder::new()
    }

    /// Scan lifecycle operations.
    pub fn scans(&self) -> Scans<'_> {
        Scans::new(self)
    }

    /// Report operations.
    pub fn reports(&self) -> Reports<'_> {
        Reports::new(self)
    }

    /// Discovery operations.
    pub fn discovery(&self) -> Discovery<'_> {
        Discovery::new(self)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the loggable prefix of the API key.
    pub fn api_key_prefix(&self) -> String {
        self.inner.config.api_key.prefix()
    }

    /// Returns the rate limit counters of the most recent response that carried them.
    pub fn last_rate_limit(&self) -> Option<RateLimitInfo> {
        *self
            .inner
            .last_rate_limit
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Checks API health. Shorthand for `discovery().health()`.
    pub async fn health(&self) -> Result<crate::core::HealthStatus, ClientError> {
        self.discovery().health().await
    }

    /// Returns API information. Shorthand for `discovery().api_info()`.
    pub async fn api_info(&self) -> Result<crate::core::ApiInfo, ClientError> {
        self.discovery().api_info().await
    }

    /// Clears cached results and discovery data.
    pub fn clear_cache(&self) {
        self.inner
            .results
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.inner.discovery.clear();
    }

    /// Sends an arbitrary authenticated request with retries.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.execute(request).await
    }

    fn prepare(&self, mut request: ApiRequest) -> ApiRequest {
        self.inner.credential.apply(&mut request);
        if request.header("x-request-id").is_none() {
            request = request.with_header("X-Request-ID", uuid::Uuid::new_v4().to_string());
        }
        request
    }

    fn record_rate_limit(&self, info: Option<RateLimitInfo>) {
        if let Some(info) = info {
            *self
                .inner
                .last_rate_limit
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(info);
        }
    }

    pub(crate) async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let method = request.method;
        let path = request.path.clone();
        let request = self.prepare(request);

        match self.inner.transport.send(request).await {
            Ok(response) => {
                self.record_rate_limit(response.rate_limit());
                tracing::debug!(%method, path = %path, status = response.status, "Request succeeded");
                Ok(response)
            }
            Err(e) => Err(self.record_failure(method, &path, e)),
        }
    }

    fn record_failure(&self, method: HttpMethod, path: &str, err: ClientError) -> ClientError {
        if let ClientError::RateLimited { rate_limit, .. } = &err {
            self.record_rate_limit(*rate_limit);
        }
        tracing::debug!(%method, path = %path, error = %err, "Request failed");
        err
    }

    pub(crate) async fn execute_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        context: &str,
    ) -> Result<T, ClientError> {
        self.execute(request).await?.json(context)
    }

    pub(crate) async fn download_to(
        &self,
        request: ApiRequest,
        path: &Path,
    ) -> Result<DownloadReceipt, ClientError> {
        let method = request.method;
        let request_path = request.path.clone();
        let request = self.prepare(request);

        match self.inner.transport.download_to(request, path).await {
            Ok(receipt) => {
                self.record_rate_limit(receipt.rate_limit());
                tracing::debug!(
                    %method,
                    path = %request_path,
                    status = receipt.status,
                    bytes = receipt.bytes_written,
                    "Download succeeded"
                );
                Ok(receipt)
            }
            Err(e) => Err(self.record_failure(method, &request_path, e)),
        }
    }

    pub(crate) fn cached_results(&self, scan_id: &str) -> Option<Arc<ScanResults>> {
        self.inner
            .results
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(scan_id)
            .cloned()
    }

    pub(crate) fn cache_results(&self, scan_id: &str, results: Arc<ScanResults>) {
        self.inner
            .results
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(scan_id.to_string(), results);
    }

    pub(crate) fn discovery_cache(&self) -> &DiscoveryCache {
        &self.inner.discovery
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::core::CredentialCarrier;
    use crate::transport::{MockReply, MockTransport};
    use serde_json::json;

    #[tokio::test]
    async fn test_requests_carry_credential_and_request_id() {
        let (client, mock) = mock_client();
        mock.on_get("/health").ok(json!({"status": "healthy"}));

        client.request(ApiRequest::get("/health")).await.unwrap();

        let sent = mock.last_request().unwrap();
        assert_eq!(
            sent.header("authorization"),
            Some(format!("Bearer {TEST_KEY}").as_str())
        );
        assert!(sent.header("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_query_carrier() {
        let mock = Arc::new(MockTransport::new());
        mock.on_get("/health").ok(json!({"status": "healthy"}));
        let config = ClientConfig::new(TEST_KEY)
            .unwrap()
            .with_carrier(CredentialCarrier::query_param());
        let client = GarakClient::builder()
            .config(config)
            .transport(Arc::clone(&mock))
            .build()
            .unwrap();

        client.request(ApiRequest::get("/health")).await.unwrap();
        let sent = mock.last_request().unwrap();
        assert_eq!(sent.query_param("api_key"), Some(TEST_KEY));
        assert_eq!(sent.header("authorization"), None);
    }

    #[tokio::test]
    async fn test_last_rate_limit_recorded() {
        let (client, mock) = mock_client();
        assert!(client.last_rate_limit().is_none());
        mock.on_get("/health").reply(
            MockReply::ok(json!({"status": "healthy"}))
                .with_header("X-RateLimit-Limit", "500")
                .with_header("X-RateLimit-Remaining", "42"),
        );

        client.health().await.unwrap();
        let info = client.last_rate_limit().unwrap();
        assert_eq!(info.limit, Some(500));
        assert_eq!(info.remaining, Some(42));
    }

    #[tokio::test]
    async fn test_authentication_error_not_retried() {
        let (client, mock) = mock_client();
        mock.on_get("/scans/quota")
            .reply(MockReply::status(401, json!({"error": "unauthorized", "message": "Invalid API key"})));

        let err = client.scans().get_quota().await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication { .. }));
        assert!(err.to_string().contains("Authentication failed"));
        assert_eq!(mock.request_count("/scans/quota"), 1);
    }

    #[test]
    fn test_debug_hides_key() {
        let (client, _mock) = mock_client();
        let debug = format!("{client:?}");
        assert!(!debug.contains(TEST_KEY));
        assert_eq!(client.api_key_prefix(), "garak_te...");
    }

    #[test]
    fn test_clones_share_state() {
        let (client, _mock) = mock_client();
        let clone = client.clone();
        assert!(Arc::ptr_eq(&client.inner, &clone.inner));
    }
}
