use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
}

impl From<broccoli_queue::error::BroccoliError> for MqError {
    fn from(e: broccoli_queue::error::BroccoliError) -> Self {
        MqError::Broker(e.to_string())
    }
}
