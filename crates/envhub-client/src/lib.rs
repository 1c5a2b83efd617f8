//! Client library for the envhub API.
//!
//! Fetches environments over HTTP, caches the last full listing in memory and
//! can export one environment into the calling process.

pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::{ClientBuilder, EnvhubClient};
pub use config::ClientConfig;
pub use error::ClientError;
pub use models::{Environment, KeyValue, Value};
