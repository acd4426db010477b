//! Error types for the aggregate runtime

use thiserror::Error;

/// Errors that can occur while operating the aggregate runtime
#[derive(Debug, Error)]
pub enum AggregateError {
    /// NATS connection error
    #[error("NATS connection error: {0}")]
    NatsConnection(String),

    /// NATS publish error
    #[error("NATS publish error: {0}")]
    NatsPublish(String),

    /// NATS subscribe error
    #[error("NATS subscribe error: {0}")]
    NatsSubscribe(String),

    /// JetStream key-value store error
    #[error("KV store error: {0}")]
    KvStore(String),

    /// JetStream stream error
    #[error("stream error: {0}")]
    Stream(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A broker operation exceeded its deadline
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Middleware rejected the command
    #[error("{0}")]
    MiddlewareRejected(String),

    /// The user's `handle_command` rejected the command
    #[error("{0}")]
    CommandRejected(String),

    /// The user's `apply_event` callback failed
    #[error("apply failed: {0}")]
    ApplyFailed(String),
}

/// Result type for aggregate runtime operations
pub type AggregateResult<T> = Result<T, AggregateError>;

impl From<serde_json::Error> for AggregateError {
    fn from(err: serde_json::Error) -> Self {
        AggregateError::Serialization(err.to_string())
    }
}

impl From<async_nats::Error> for AggregateError {
    fn from(err: async_nats::Error) -> Self {
        AggregateError::NatsConnection(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AggregateError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AggregateError::Timeout(err.to_string())
    }
}
