//! Real-time market tick distribution service
//!
//! Core library: tick store, coalescing fan-out publisher, WebSocket
//! gateway, synthetic tick generator and the consumer-side stream client.

pub mod client;
pub mod core;
pub mod gateway;
pub mod generator;
pub mod infrastructure;
pub mod publisher;

// Re-export commonly used types
pub use infrastructure::config::{ApiConfig, ClientConfig, Config, GeneratorConfig, PublisherConfig};

use thiserror::Error;

/// Main error type for the tick service
#[derive(Error, Debug)]
pub enum TickError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Subscriber channel closed or full")]
    ChannelSend,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TickError>;
