use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Bucketed object storage addressed by string keys.
///
/// Samples live under their hex digest, avatars under the owning username.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `bucket/key`, replacing any previous object.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Retrieve all bytes of an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(bucket, key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve an object as a streaming async reader.
    async fn get_stream(&self, bucket: &str, key: &str) -> Result<BoxReader, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// Get the size of an object in bytes.
    async fn size(&self, bucket: &str, key: &str) -> Result<u64, StorageError>;

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;
}

/// Reject bucket names and keys that could escape their namespace.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.len() <= 255
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
