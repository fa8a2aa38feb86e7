//! Error types for event publication and republication.

use thiserror::Error;

pub type EventResult<T> = Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("store error: {0}")]
    Store(#[from] cart_store::StoreError),

    #[error("failed to publish to channel {channel}: {message}")]
    PublishFailed { channel: String, message: String },

    #[error("failed to serialize event payload: {0}")]
    Serialization(String),

    #[error("republisher is already running")]
    AlreadyRunning,

    #[error("invalid republisher config: {0}")]
    InvalidConfig(String),
}

impl From<redis::RedisError> for EventError {
    fn from(err: redis::RedisError) -> Self {
        EventError::PublishFailed { channel: "tranlog_report".into(), message: err.to_string() }
    }
}
