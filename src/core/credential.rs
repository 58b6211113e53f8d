//! API key handling and credential carriers.

use crate::core::error::ClientError;
use crate::core::request::ApiRequest;

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Prefix every Garak API key starts with.
pub const API_KEY_PREFIX: &str = "garak_";

/// Minimum accepted API key length.
pub const MIN_API_KEY_LEN: usize = 20;

/// Returns `true` if `key` has the shape of a Garak API key.
pub fn is_valid_api_key(key: &str) -> bool {
    key.starts_with(API_KEY_PREFIX) && key.len() >= MIN_API_KEY_LEN
}

/// A validated API key. Only its prefix is ever displayed.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Validates and wraps an API key.
    pub fn new(key: impl Into<String>) -> Result<Self, ClientError> {
        let key = key.into();
        if !is_valid_api_key(&key) {
            return Err(ClientError::configuration(format!(
                "Invalid API key format: keys start with '{API_KEY_PREFIX}' and are at least {MIN_API_KEY_LEN} characters"
            )));
        }
        Ok(Self(SecretString::from(key)))
    }

    /// Returns the first 8 characters followed by `...`, safe for logs.
    pub fn prefix(&self) -> String {
        let key = self.0.expose_secret();
        let head: String = key.chars().take(8).collect();
        format!("{head}...")
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&self.prefix()).finish()
    }
}

/// Where the API key travels on each request. Exactly one carrier is active per client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CredentialCarrier {
    /// `Authorization: Bearer <key>`.
    #[default]
    Bearer,
    /// A custom header, `X-API-Key` by default.
    Header(String),
    /// A query parameter, `api_key` by default.
    Query(String),
}

impl CredentialCarrier {
    /// The `X-API-Key` header carrier.
    pub fn api_key_header() -> Self {
        Self::Header("X-API-Key".to_string())
    }

    /// The `api_key` query parameter carrier.
    pub fn query_param() -> Self {
        Self::Query("api_key".to_string())
    }
}

/// An API key together with its carrier.
#[derive(Debug, Clone)]
pub struct Credential {
    key: ApiKey,
    carrier: CredentialCarrier,
}

impl Credential {
    /// Creates a credential.
    pub fn new(key: ApiKey, carrier: CredentialCarrier) -> Self {
        Self { key, carrier }
    }

    /// Returns the key.
    pub fn key(&self) -> &ApiKey {
        &self.key
    }

    /// Returns the carrier.
    pub fn carrier(&self) -> &CredentialCarrier {
        &self.carrier
    }

    /// Attaches the key to `request` using the configured carrier.
    pub fn apply(&self, request: &mut ApiRequest) {
        let key = self.key.expose().to_string();
        match &self.carrier {
            CredentialCarrier::Bearer => request
                .headers
                .push(("Authorization".to_string(), format!("Bearer {key}"))),
            CredentialCarrier::Header(name) => request.headers.push((name.clone(), key)),
            CredentialCarrier::Query(name) => request.query.push((name.clone(), key)),
        }
    }
}
