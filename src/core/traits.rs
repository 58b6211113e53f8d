//! The transport seam.
//!
//! Every backend call goes through a [`Transport`]. The production
//! implementation speaks HTTP; tests script responses in memory. Retries are
//! layered on top by wrapping one transport in another.

use crate::core::error::ClientError;
use crate::core::request::ApiRequest;
use crate::core::response::{ApiResponse, DownloadReceipt};

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// Sends API requests to the backend.
///
/// # Implementation Notes
///
/// - `send` performs a single attempt and maps non-2xx statuses to typed
///   errors with [`ApiResponse::error_for_status`].
/// - Connection failures and request timeouts are `ClientError::Network`.
/// - Implementations must not panic on malformed responses.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use garak_sdk::core::{ApiRequest, ApiResponse, ClientError, Transport};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct Offline;
///
/// #[async_trait]
/// impl Transport for Offline {
///     fn name(&self) -> &str {
///         "offline"
///     }
///
///     async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, ClientError> {
///         Err(ClientError::network("offline"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Returns a short identifier used in logs.
    fn name(&self) -> &str;

    /// Sends one request and returns the successful response.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError>;

    /// Sends one request and writes the successful response body to `path`.
    ///
    /// The file is created or truncated on every call, so a retried download
    /// never appends to a partial one.
    async fn download_to(
        &self,
        request: ApiRequest,
        path: &Path,
    ) -> Result<DownloadReceipt, ClientError> {
        let response = self.send(request).await?;
        tokio::fs::write(path, &response.body).await?;
        Ok(DownloadReceipt {
            status: response.status,
            bytes_written: response.body.len() as u64,
            headers: response.headers,
        })
    }
}

/// Type alias for a shared transport.
pub type ArcTransport = Arc<dyn Transport>;

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        (**self).send(request).await
    }

    async fn download_to(
        &self,
        request: ApiRequest,
        path: &Path,
    ) -> Result<DownloadReceipt, ClientError> {
        (**self).download_to(request, path).await
    }
}
