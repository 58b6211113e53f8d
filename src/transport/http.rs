//! HTTP transport backed by `reqwest`.
//!
//! Every request goes to `{base_url}/api/v1{path}`. One call is one attempt;
//! retries are added by wrapping this transport in a
//! [`RetryingTransport`](crate::transport::RetryingTransport).

use crate::core::{ApiRequest, ApiResponse, ClientError, DownloadReceipt, HttpMethod, Transport};

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// API base path appended to the configured base URL.
pub const API_PREFIX: &str = "/api/v1";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("garak-sdk-rust/", env!("CARGO_PKG_VERSION"));

/// Transport that speaks HTTP to a Garak deployment.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport for `base_url`.
    ///
    /// `timeout` bounds each request; `verify_ssl = false` accepts invalid
    /// certificates and is meant for local deployments only.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        verify_ssl: bool,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::configuration(format!(
                "base URL must start with http:// or https://, got '{base_url}'"
            )));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|e| {
                ClientError::configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { base_url, client })
    }

    /// Returns the base URL without the API prefix.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the absolute URL for an API path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, ClientError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, self.url_for(&request.path))
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            // .json() also sets Content-Type: application/json
            builder = builder.json(body);
        }

        builder.send().await.map_err(map_reqwest_error)
    }
}

/// Maps a reqwest failure. The URL is dropped first since it may carry the
/// API key as a query parameter.
fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    let err = err.without_url();
    if err.is_timeout() {
        ClientError::network(format!("request timed out: {err}"))
    } else if err.is_connect() {
        ClientError::network(format!("connection failed: {err}"))
    } else if err.is_builder() {
        ClientError::configuration(format!("invalid request: {err}"))
    } else {
        ClientError::network(err.to_string())
    }
}

fn collect_headers(response: &reqwest::Response) -> BTreeMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

async fn into_api_response(response: reqwest::Response) -> Result<ApiResponse, ClientError> {
    let status = response.status().as_u16();
    let headers = collect_headers(&response);
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    Ok(ApiResponse {
        status,
        headers,
        body,
    })
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        tracing::trace!(method = %request.method, path = %request.path, "Sending request");
        let response = self.execute(&request).await?;
        let response = into_api_response(response).await?;
        tracing::trace!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            bytes = response.body.len(),
            "Received response"
        );
        response.error_for_status(&request.path)
    }

    async fn download_to(
        &self,
        request: ApiRequest,
        path: &Path,
    ) -> Result<DownloadReceipt, ClientError> {
        let response = self.execute(&request).await?;
        if !response.status().is_success() {
            let response = into_api_response(response).await?;
            response.error_for_status(&request.path)?;
            return Err(ClientError::network("unexpected download response"));
        }

        let status = response.status().as_u16();
        let headers = collect_headers(&response);
        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        tracing::debug!(path = %request.path, bytes = written, "Downloaded response body");
        Ok(DownloadReceipt {
            status,
            headers,
            bytes_written: written,
        })
    }
}
