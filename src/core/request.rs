//! Outgoing request records.
//!
//! [`ApiRequest`] is the transport-level envelope; the remaining types are the
//! typed bodies and queries of the scan endpoints, validated client-side
//! before anything is sent.

use crate::core::error::ClientError;
use crate::core::types::ScanStatus;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP method of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single API call, relative to the `/api/v1` base path.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path below `/api/v1`, always starting with `/`.
    pub path: String,
    /// Query parameters in insertion order.
    pub query: Vec<(String, String)>,
    /// Extra headers (credentials are attached here).
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Creates a request with no query, headers or body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            method,
            path,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Creates a `PATCH` request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    /// Creates a `DELETE` request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Appends a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Serializes `body` as the JSON payload.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::validation(format!("unserializable request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Returns the value of the first query parameter named `key`.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Rejects identifiers that are empty or would escape their path segment.
pub fn validate_path_segment(kind: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::validation(format!("{kind} must not be empty")));
    }
    if value.contains(['/', '?', '#']) {
        return Err(ClientError::validation(format!(
            "{kind} '{value}' contains reserved characters"
        )));
    }
    Ok(())
}

/// Body of `POST /scans`.
#[derive(Clone, PartialEq, Serialize)]
pub struct CreateScanRequest {
    /// Generator to scan (e.g. `openai`).
    pub generator: String,
    /// Target model name.
    pub model_name: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Probe categories to run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub probe_categories: Vec<String>,
    /// Individual probes to run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<String>,
    /// Parallel attempts per probe (1-10).
    pub parallel_attempts: u8,
    /// Provider credentials forwarded to the generator.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub api_keys: BTreeMap<String, String>,
    /// REST generator configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_config: Option<serde_json::Value>,
    /// Whether to consume a free-tier slot.
    pub use_free_tier: bool,
}

impl CreateScanRequest {
    /// Maximum accepted `parallel_attempts`.
    pub const MAX_PARALLEL_ATTEMPTS: u8 = 10;

    /// Creates a request for the given generator and model.
    pub fn new(generator: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            generator: generator.into(),
            model_name: model_name.into(),
            name: None,
            description: None,
            probe_categories: Vec::new(),
            probes: Vec::new(),
            parallel_attempts: 1,
            api_keys: BTreeMap::new(),
            rest_config: None,
            use_free_tier: false,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the probe categories.
    pub fn with_probe_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probe_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the individual probes.
    pub fn with_probes<I, S>(mut self, probes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probes = probes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the number of parallel attempts.
    pub fn with_parallel_attempts(mut self, attempts: u8) -> Self {
        self.parallel_attempts = attempts;
        self
    }

    /// Adds a provider API key, e.g. `("OPENAI_API_KEY", "sk-...")`.
    pub fn with_api_key(mut self, env_name: impl Into<String>, key: impl Into<String>) -> Self {
        self.api_keys.insert(env_name.into(), key.into());
        self
    }

    /// Sets the REST generator configuration.
    pub fn with_rest_config(mut self, config: serde_json::Value) -> Self {
        self.rest_config = Some(config);
        self
    }

    /// Requests a free-tier scan.
    pub fn with_free_tier(mut self, use_free_tier: bool) -> Self {
        self.use_free_tier = use_free_tier;
        self
    }

    /// Performs client-side validation; the server validates the rest.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.generator.trim().is_empty() {
            return Err(ClientError::validation("generator is required"));
        }
        if self.model_name.trim().is_empty() {
            return Err(ClientError::validation("model_name is required"));
        }
        if !(1..=Self::MAX_PARALLEL_ATTEMPTS).contains(&self.parallel_attempts) {
            return Err(ClientError::validation(format!(
                "parallel_attempts must be between 1 and {}, got {}",
                Self::MAX_PARALLEL_ATTEMPTS,
                self.parallel_attempts
            )));
        }
        if self.probe_categories.iter().any(|c| c.trim().is_empty()) {
            return Err(ClientError::validation("probe category names must not be empty"));
        }
        if self.probes.iter().any(|p| p.trim().is_empty()) {
            return Err(ClientError::validation("probe names must not be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for CreateScanRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key_names: Vec<&str> = self.api_keys.keys().map(String::as_str).collect();
        f.debug_struct("CreateScanRequest")
            .field("generator", &self.generator)
            .field("model_name", &self.model_name)
            .field("name", &self.name)
            .field("probe_categories", &self.probe_categories)
            .field("probes", &self.probes)
            .field("parallel_attempts", &self.parallel_attempts)
            .field("api_keys", &key_names)
            .field("use_free_tier", &self.use_free_tier)
            .finish_non_exhaustive()
    }
}

/// Body of `PATCH /scans/{id}`; only name and description can change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanUpdate {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScanUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the new description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns `true` if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Query of `GET /scans`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListScansQuery {
    /// Page number (1-based).
    pub page: u32,
    /// Page size (1-100).
    pub per_page: u32,
    /// Status filter.
    pub status: Option<ScanStatus>,
    /// Free-text search.
    pub search: Option<String>,
}

impl Default for ListScansQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
            status: None,
            search: None,
        }
    }
}

impl ListScansQuery {
    /// Largest page size the backend accepts.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Creates the default query (page 1, 20 per page).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the page size.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Filters by status.
    pub fn with_status(mut self, status: ScanStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by search text.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Validates the paging bounds.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.page == 0 {
            return Err(ClientError::validation("page must be at least 1"));
        }
        if self.per_page == 0 || self.per_page > Self::MAX_PER_PAGE {
            return Err(ClientError::validation(format!(
                "per_page must be between 1 and {}",
                Self::MAX_PER_PAGE
            )));
        }
        Ok(())
    }

    pub(crate) fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        request = request
            .with_query("page", self.page)
            .with_query("per_page", self.per_page);
        if let Some(status) = self.status {
            request = request.with_query("status", status);
        }
        if let Some(search) = &self.search {
            request = request.with_query("search", search);
        }
        request
    }
}

/// Options of `GET /scans/{id}/status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusQuery {
    /// Include the scan's output log.
    pub include_output: bool,
    /// First output line to return.
    pub start_line: Option<u64>,
    /// Maximum output lines to return.
    pub max_lines: Option<u64>,
}

impl StatusQuery {
    /// Status without output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Status including output lines.
    pub fn with_output(start_line: Option<u64>, max_lines: Option<u64>) -> Self {
        Self {
            include_output: true,
            start_line,
            max_lines,
        }
    }

    pub(crate) fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if self.include_output {
            request = request.with_query("include_output", "true");
            if let Some(start) = self.start_line {
                request = request.with_query("start_line", start);
            }
            if let Some(max) = self.max_lines {
                request = request.with_query("max_lines", max);
            }
        }
        request
    }
}
