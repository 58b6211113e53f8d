//! Client configuration and the [`GarakClient`] entry point.

pub mod config;
pub mod garak;

pub use config::ClientConfig;
pub use garak::{GarakClient, GarakClientBuilder};
