//! Mock transport for testing.
//!
//! This module provides a scripted in-memory transport that can be used in
//! tests to simulate backend responses without a network connection.

use crate::core::{ApiRequest, ApiResponse, ClientError, HttpMethod, Transport};

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone)]
enum ReplyKind {
    Response { status: u16, body: Bytes },
    NetworkError(String),
}

/// One scripted reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    kind: ReplyKind,
    headers: Vec<(String, String)>,
    latency: Option<Duration>,
}

impl MockReply {
    /// A reply with the given status and JSON body.
    pub fn status(status: u16, body: serde_json::Value) -> Self {
        Self {
            kind: ReplyKind::Response {
                status,
                body: Bytes::from(body.to_string()),
            },
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            latency: None,
        }
    }

    /// A `200 OK` reply with a JSON body.
    pub fn ok(body: serde_json::Value) -> Self {
        Self::status(200, body)
    }

    /// A reply with a raw body.
    pub fn bytes(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            kind: ReplyKind::Response {
                status,
                body: body.into(),
            },
            headers: Vec::new(),
            latency: None,
        }
    }

    /// A connection failure.
    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::NetworkError(message.into()),
            headers: Vec::new(),
            latency: None,
        }
    }

    /// Adds a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Delays the reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn into_response(self, path: &str) -> Result<ApiResponse, ClientError> {
        match self.kind {
            ReplyKind::NetworkError(message) => Err(ClientError::network(message)),
            ReplyKind::Response { status, body } => {
                let response = self
                    .headers
                    .into_iter()
                    .fold(ApiResponse::new(status, body), |resp, (k, v)| {
                        resp.with_header(k, v)
                    });
                response.error_for_status(path)
            }
        }
    }
}

type RouteKey = (HttpMethod, String);

/// A scripted transport.
///
/// Each route (method + path) holds a FIFO of replies; the last reply of a
/// route repeats once the others are consumed. Requests to unscripted routes
/// receive a `404` error envelope. Every request is recorded.
///
/// # Examples
///
/// ```rust
/// use garak_sdk::transport::{MockReply, MockTransport};
/// use serde_json::json;
///
/// let mock = MockTransport::new();
/// mock.on_get("/scans/abc/status")
///     .reply(MockReply::ok(json!({"scan_id": "abc", "status": "running"})))
///     .reply(MockReply::ok(json!({"scan_id": "abc", "status": "completed"})));
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: RwLock<HashMap<RouteKey, VecDeque<MockReply>>>,
    requests: RwLock<Vec<ApiRequest>>,
    request_count: AtomicU64,
}

/// Handle for scripting replies on one route.
#[derive(Debug)]
pub struct MockRoute<'a> {
    transport: &'a MockTransport,
    key: RouteKey,
}

impl MockRoute<'_> {
    /// Appends a reply to this route.
    pub fn reply(self, reply: MockReply) -> Self {
        self.transport
            .routes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(self.key.clone())
            .or_default()
            .push_back(reply);
        self
    }

    /// Appends a `200 OK` JSON reply.
    pub fn ok(self, body: serde_json::Value) -> Self {
        self.reply(MockReply::ok(body))
    }
}

impl MockTransport {
    /// Creates a transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts replies for `method` on `path`.
    pub fn on(&self, method: HttpMethod, path: impl Into<String>) -> MockRoute<'_> {
        MockRoute {
            transport: self,
            key: (method, path.into()),
        }
    }

    /// Scripts replies for `GET path`.
    pub fn on_get(&self, path: impl Into<String>) -> MockRoute<'_> {
        self.on(HttpMethod::Get, path)
    }

    /// Scripts replies for `POST path`.
    pub fn on_post(&self, path: impl Into<String>) -> MockRoute<'_> {
        self.on(HttpMethod::Post, path)
    }

    /// Scripts replies for `PATCH path`.
    pub fn on_patch(&self, path: impl Into<String>) -> MockRoute<'_> {
        self.on(HttpMethod::Patch, path)
    }

    /// Scripts replies for `DELETE path`.
    pub fn on_delete(&self, path: impl Into<String>) -> MockRoute<'_> {
        self.on(HttpMethod::Delete, path)
    }

    /// Removes every scripted reply.
    pub fn clear_routes(&self) {
        self.routes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Returns every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the most recent request.
    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }

    /// Returns the number of requests received on `path`, any method.
    pub fn request_count(&self, path: &str) -> usize {
        self.requests
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    /// Returns the number of requests received on `method path`.
    pub fn request_count_for(&self, method: HttpMethod, path: &str) -> usize {
        self.requests
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Returns the total number of requests received.
    pub fn total_requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    fn next_reply(&self, key: &RouteKey) -> Option<MockReply> {
        let mut routes = self
            .routes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let queue = routes.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let key = (request.method, request.path.clone());
        let path = request.path.clone();
        self.requests
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        let reply = self.next_reply(&key).unwrap_or_else(|| {
            MockReply::status(
                404,
                serde_json::json!({"error": "not_found", "message": format!("no mock route for {} {}", key.0, key.1)}),
            )
        });

        if let Some(latency) = reply.latency {
            tokio::time::sleep(latency).await;
        }

        reply.into_response(&path)
    }
}
