//! S3-compatible object store (AWS S3, MinIO, R2, ...).

use std::io::Cursor;

use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;

use super::error::StorageError;
use super::traits::{BoxReader, ObjectStore, validate_key};

/// Connection settings for an S3-compatible endpoint.
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Prefix prepended to every logical bucket name.
    pub bucket_prefix: String,
    /// Path-style addressing, required by MinIO.
    pub path_style: bool,
}

/// Object store backed by one S3 bucket per logical bucket.
pub struct S3ObjectStore {
    settings: S3Settings,
    credentials: Credentials,
    max_size: u64,
}

impl S3ObjectStore {
    pub fn new(settings: S3Settings, max_size: u64) -> Result<Self, StorageError> {
        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid S3 credentials: {e}")))?;
        Ok(Self {
            settings,
            credentials,
            max_size,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, StorageError> {
        validate_key(name)?;
        let region = Region::Custom {
            region: self.settings.region.clone(),
            endpoint: self.settings.endpoint.clone(),
        };
        let full_name = format!("{}{}", self.settings.bucket_prefix, name);
        let bucket =
            Bucket::new(&full_name, region, self.credentials.clone()).map_err(backend_error)?;
        Ok(if self.settings.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

fn backend_error(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_not_found(err: &S3Error) -> bool {
    matches!(err, S3Error::HttpFailWithBody(404, _))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }
        validate_key(key)?;
        let response = self
            .bucket(bucket)?
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(backend_error)?;
        match response.status_code() {
            200..=299 => Ok(()),
            code => Err(StorageError::Backend(format!(
                "put {bucket}/{key} returned HTTP {code}"
            ))),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        let response = match self.bucket(bucket)?.get_object(key).await {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => {
                return Err(StorageError::NotFound(format!("{bucket}/{key}")));
            }
            Err(e) => return Err(backend_error(e)),
        };
        match response.status_code() {
            200..=299 => Ok(response.bytes().to_vec()),
            404 => Err(StorageError::NotFound(format!("{bucket}/{key}"))),
            code => Err(StorageError::Backend(format!(
                "get {bucket}/{key} returned HTTP {code}"
            ))),
        }
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> Result<BoxReader, StorageError> {
        let bytes = self.get(bucket, key).await?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        match self.size(bucket, key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn size(&self, bucket: &str, key: &str) -> Result<u64, StorageError> {
        validate_key(key)?;
        let (head, code) = match self.bucket(bucket)?.head_object(key).await {
            Ok(result) => result,
            Err(e) if is_not_found(&e) => {
                return Err(StorageError::NotFound(format!("{bucket}/{key}")));
            }
            Err(e) => return Err(backend_error(e)),
        };
        match code {
            200..=299 => Ok(head.content_length.unwrap_or_default().max(0) as u64),
            404 => Err(StorageError::NotFound(format!("{bucket}/{key}"))),
            code => Err(StorageError::Backend(format!(
                "head {bucket}/{key} returned HTTP {code}"
            ))),
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        if !self.exists(bucket, key).await? {
            return Ok(false);
        }
        self.bucket(bucket)?
            .delete_object(key)
            .await
            .map_err(backend_error)?;
        Ok(true)
    }
}
