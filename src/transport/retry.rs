//! Retry configuration and the retrying transport wrapper.

use crate::core::{ApiRequest, ApiResponse, ClientError, DownloadReceipt, Transport};

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum backoff delay between retries.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,

    /// Fraction of the delay added as random jitter (0.0 disables jitter).
    pub jitter: f64,

    /// Longest server-requested `Retry-After` the client will wait out.
    /// Longer waits surface the rate-limit error immediately.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: 0.1,
            max_retry_after: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Sets the jitter fraction, clamped to 0.0-1.0.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Sets the longest `Retry-After` the client will honor.
    pub fn with_max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = max;
        self
    }

    /// Calculates the un-jittered backoff before attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_delay as u64)
    }

    /// Returns whether another attempt should be made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Computes the wait before attempt `attempt` after `error`, or `None` if
    /// the error must surface.
    ///
    /// A rate-limited retry never waits less than the server's `Retry-After`;
    /// jitter is only ever added on top of the base delay.
    pub fn retry_delay(&self, attempt: u32, error: &ClientError) -> Option<Duration> {
        if !error.is_recoverable() || !self.should_retry(attempt) {
            return None;
        }
        let backoff = self.delay_for_attempt(attempt);
        let base = match error.retry_after() {
            Some(after) if after > self.max_retry_after => return None,
            Some(after) => after.max(backoff),
            None => backoff,
        };
        Some(add_jitter(base, self.jitter))
    }
}

/// Adds up to `fraction * delay` of random jitter.
pub(crate) fn add_jitter(delay: Duration, fraction: f64) -> Duration {
    if fraction <= 0.0 || delay.is_zero() {
        return delay;
    }
    let extra = rand::thread_rng().gen_range(0.0..=fraction);
    let extra = Duration::try_from_secs_f64(delay.as_secs_f64() * extra).unwrap_or_default();
    delay.saturating_add(extra)
}

/// Executes an async operation, retrying transient failures per `config`.
pub async fn retry_async<F, Fut, T>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                let Some(delay) = config.retry_delay(attempt, &e) else {
                    return Err(e);
                };
                tracing::debug!(
                    operation = label,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// A transport wrapper that retries transient failures of the inner transport.
///
/// `Network`, `Server` and `RateLimited` errors are retried with exponential
/// backoff; every other error surfaces on the first attempt.
#[derive(Debug)]
pub struct RetryingTransport<T: Transport> {
    inner: T,
    config: RetryConfig,
}

impl<T: Transport> RetryingTransport<T> {
    /// Wraps `inner` with the given retry policy.
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Returns a reference to the wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Returns the retry policy.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let label = format!("{} {}", request.method, request.path);
        retry_async(&self.config, &label, || self.inner.send(request.clone())).await
    }

    async fn download_to(
        &self,
        request: ApiRequest,
        path: &Path,
    ) -> Result<DownloadReceipt, ClientError> {
        let label = format!("{} {}", request.method, request.path);
        retry_async(&self.config, &label, || {
            self.inner.download_to(request.clone(), path)
        })
        .await
    }
}
