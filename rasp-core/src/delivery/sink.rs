use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("rate limited by recipient")]
    RateLimited { retry_after: Option<Duration> },
    #[error("transient send failure: {0}")]
    Transient(String),
    #[error("message rejected: {0}")]
    Rejected(String),
}

impl SinkError {
    /// Wait requested by the recipient before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SinkError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Outbound text channel of one requester.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), SinkError>;
}
