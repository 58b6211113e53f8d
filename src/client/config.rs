//! Client configuration.

use crate::core::{ApiKey, ClientError, CredentialCarrier};
use crate::transport::RetryConfig;

use std::path::Path;
use std::time::Duration;

/// Default Garak API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://detect.garaksecurity.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "GARAK_API_KEY";

/// Fallback environment variable for the API key.
pub const ENV_SDK_API_KEY: &str = "GARAK_SDK_API_KEY";

/// Environment variable overriding the base URL.
pub const ENV_BASE_URL: &str = "GARAK_API_BASE_URL";

/// Environment variable overriding the request timeout, in seconds.
pub const ENV_TIMEOUT: &str = "GARAK_API_TIMEOUT";

/// Configuration for a [`GarakClient`](crate::client::GarakClient).
///
/// There is no process-wide configuration; every client owns its own.
///
/// # Examples
///
/// ```rust
/// use garak_sdk::client::ClientConfig;
/// use garak_sdk::core::CredentialCarrier;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("garak_1234567890abcdefghijklmnop")
///     .unwrap()
///     .with_base_url("http://localhost:8000/")
///     .with_timeout(Duration::from_secs(10))
///     .with_carrier(CredentialCarrier::api_key_header());
///
/// assert_eq!(config.base_url, "http://localhost:8000");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key.
    pub api_key: ApiKey,

    /// How the API key travels on each request.
    pub carrier: CredentialCarrier,

    /// Base URL without the `/api/v1` prefix and without a trailing slash.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Whether TLS certificates are verified.
    pub verify_ssl: bool,

    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Creates a configuration with defaults for the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            api_key: ApiKey::new(api_key)?,
            carrier: CredentialCarrier::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            verify_ssl: true,
            retry: RetryConfig::default(),
        })
    }

    /// Loads configuration from the process environment.
    ///
    /// `GARAK_API_KEY` takes priority over `GARAK_SDK_API_KEY`.
    /// `GARAK_API_BASE_URL` and `GARAK_API_TIMEOUT` are optional.
    pub fn from_env() -> Result<Self, ClientError> {
        let key = env_var(ENV_API_KEY)
            .or_else(|| env_var(ENV_SDK_API_KEY))
            .ok_or_else(|| {
                ClientError::configuration(format!(
                    "API key is required: set {ENV_API_KEY} or pass it explicitly"
                ))
            })?;

        let mut config = Self::new(key)?;

        if let Some(url) = env_var(ENV_BASE_URL) {
            config = config.with_base_url(url);
        }

        if let Some(raw) = env_var(ENV_TIMEOUT) {
            let secs: f64 = raw.trim().parse().map_err(|_| {
                ClientError::configuration(format!("{ENV_TIMEOUT} must be a number, got '{raw}'"))
            })?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ClientError::configuration(format!(
                    "{ENV_TIMEOUT} must be positive, got '{raw}'"
                )));
            }
            let timeout = Duration::try_from_secs_f64(secs).map_err(|_| {
                ClientError::configuration(format!("{ENV_TIMEOUT} is out of range, got '{raw}'"))
            })?;
            config = config.with_timeout(timeout);
        }

        tracing::debug!(
            api_key = %config.api_key.prefix(),
            base_url = %config.base_url,
            "Loaded client configuration from environment"
        );

        Ok(config)
    }

    /// Loads a dotenv file into the environment, then calls [`from_env`](Self::from_env).
    ///
    /// Variables already set in the process environment win over the file.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        dotenvy::from_path(path).map_err(|e| {
            ClientError::configuration(format!(
                "failed to load env file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_env()
    }

    /// Sets the base URL; a trailing slash is stripped.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the credential carrier.
    pub fn with_carrier(mut self, carrier: CredentialCarrier) -> Self {
        self.carrier = carrier;
        self
    }

    /// Enables or disables TLS certificate verification.
    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const KEY: &str = "garak_test_key_1234567890abcdefghijklmnopqrst";

    fn clear_env() {
        for var in [ENV_API_KEY, ENV_SDK_API_KEY, ENV_BASE_URL, ENV_TIMEOUT] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new(KEY).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.carrier, CredentialCarrier::Bearer);
        assert!(config.verify_ssl);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let err = ClientConfig::new("invalid_key").unwrap_err();
        assert!(matches!(err, ClientError::Configuration { .. }));
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let config = ClientConfig::new(KEY)
            .unwrap()
            .with_base_url("https://test.garaksecurity.com/");
        assert_eq!(config.base_url, "https://test.garaksecurity.com");
    }

    #[test]
    fn test_debug_shows_only_prefix() {
        let config = ClientConfig::new(KEY).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("garak_te..."));
        assert!(!debug.contains(KEY));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        std::env::set_var(ENV_API_KEY, KEY);
        std::env::set_var(ENV_BASE_URL, "https://test.garaksecurity.com");
        std::env::set_var(ENV_TIMEOUT, "12");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_key.prefix(), "garak_te...");
        assert_eq!(config.base_url, "https://test.garaksecurity.com");
        assert_eq!(config.timeout, Duration::from_secs(12));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_fallback_and_priority() {
        clear_env();
        let secondary = "garak_secondary_key_1234567890";
        std::env::set_var(ENV_SDK_API_KEY, secondary);
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_key.prefix(), "garak_se...");

        std::env::set_var(ENV_API_KEY, "garak_primary_key_1234567890");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.api_key.prefix(), "garak_pr...");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_key() {
        clear_env();
        let err = ClientConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("API key is required"));
    }

    #[test]
    #[serial]
    fn test_from_env_bad_timeout() {
        clear_env();
        std::env::set_var(ENV_API_KEY, KEY);
        std::env::set_var(ENV_TIMEOUT, "soon");
        assert!(ClientConfig::from_env().is_err());

        std::env::set_var(ENV_TIMEOUT, "1e30");
        let err = ClientConfig::from_env().unwrap_err();
        assert!(matches!(err, ClientError::Configuration { .. }));
        assert!(err.to_string().contains("out of range"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{ENV_API_KEY}={KEY}").unwrap();
        writeln!(file, "{ENV_BASE_URL}=http://localhost:8000/").unwrap();

        let config = ClientConfig::from_env_file(file.path()).unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
        clear_env();
    }
}
