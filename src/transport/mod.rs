//! Transport implementations.
//!
//! - [`http`] - The production HTTP transport (`reqwest`)
//! - [`mock`] - A scripted in-memory transport for tests
//! - [`retry`] - Retry policy and the [`RetryingTransport`] wrapper
//!
//! ## Implementing a Custom Transport
//!
//! Implement [`Transport`](crate::core::Transport) and pass it to
//! [`GarakClientBuilder::transport`](crate::client::GarakClientBuilder::transport);
//! the client wraps it with its retry policy.

pub mod http;
pub mod mock;
pub mod retry;

pub use http::HttpTransport;
pub use mock::{MockReply, MockRoute, MockTransport};
pub use retry::{retry_async, RetryConfig, RetryingTransport};
