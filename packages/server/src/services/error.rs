use std::time::Duration;

use common::storage::StorageError;
use mq::error::MqError;
use thiserror::Error;

use crate::store::StoreError;

/// Failure taxonomy shared by all service components.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("payload too large ({actual} > {limit} bytes)")]
    TooLarge { actual: u64, limit: u64 },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Optimistic-concurrency retries ran out against concurrent writers.
    #[error("{0}")]
    Contention(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    /// The actor is not allowed to perform this operation on the target.
    #[error("{0}")]
    Unauthorized(String),

    /// Missing, malformed, expired or wrong-purpose token.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The account exists but has not confirmed its email address.
    #[error("account is not confirmed")]
    NotConfirmed,

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("object storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("document store error: {0}")]
    Store(StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] MqError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Failures of a dependency rather than of the request itself. The
    /// caller may retry the whole operation.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Contention(_)
                | Self::Storage(_)
                | Self::Store(_)
                | Self::Queue(_)
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { collection, key } => Self::Contention(format!(
                "{collection}/{key} is being modified concurrently, try again"
            )),
            StoreError::Timeout { after, .. } => Self::Timeout {
                operation: "document store call",
                after,
            },
            other => Self::Store(other),
        }
    }
}

/// Run `fut`, converting an elapsed `after` into [`ServiceError::Timeout`].
pub(crate) async fn with_timeout<T, E, F>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, ServiceError>
where
    F: std::future::Future<Output = Result<T, E>>,
    ServiceError: From<E>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(ServiceError::from),
        Err(_) => Err(ServiceError::Timeout { operation, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn elapsed_operations_become_timeouts() {
        let result: Result<(), ServiceError> = with_timeout(
            "slow call",
            Duration::from_millis(5),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<(), StorageError>(())
            },
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { operation: "slow call", .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn exhausted_write_retries_are_transient_contention() {
        let err = ServiceError::from(StoreError::conflict("users", "alice"));
        assert!(matches!(err, ServiceError::Contention(_)));
        assert!(err.is_transient());
        assert!(!ServiceError::Conflict("Username already taken".into()).is_transient());
    }

    #[test]
    fn store_timeouts_become_service_timeouts() {
        let err = ServiceError::from(StoreError::Timeout {
            collection: "files",
            after: Duration::from_secs(30),
        });
        assert!(matches!(
            err,
            ServiceError::Timeout { operation: "document store call", .. }
        ));
        assert!(err.is_transient());
    }
}
