use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{ContentHash, FileStatus};
use common::retry::BackoffPolicy;
use common::storage::{ObjectStore, StorageError};
use tracing::{debug, info, instrument, warn};
use zip::unstable::write::FileOptionsExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::{ServiceError, with_timeout};
use crate::domain::{FileRecord, Submission};
use crate::store::{Collection, Mutation, Versioned};
use crate::utils::filename::sanitize_submission_filename;

/// Conventional password for archives carrying live malware.
pub const ARCHIVE_PASSWORD: &[u8] = b"infected";

const SAMPLE_CONTENT_TYPE: &str = "application/octet-stream";

/// Result of recording a submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub file: FileRecord,
    /// `true` when this call created the file record.
    pub is_new: bool,
}

#[derive(Debug, Clone)]
pub struct ContentStoreSettings {
    pub bucket: String,
    pub max_file_size: u64,
    pub timeout: Duration,
    pub write_policy: BackoffPolicy,
}

/// Stores each distinct content once and keeps its single file record.
#[derive(Clone)]
pub struct ContentAddressStore {
    files: Collection<FileRecord>,
    blobs: Arc<dyn ObjectStore>,
    settings: ContentStoreSettings,
}

impl ContentAddressStore {
    pub fn new(
        files: Collection<FileRecord>,
        blobs: Arc<dyn ObjectStore>,
        settings: ContentStoreSettings,
    ) -> Self {
        Self {
            files,
            blobs,
            settings,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.settings.max_file_size
    }

    /// Record a submission of `data`, uploading it if the content is new.
    ///
    /// The upload happens before the record is created, so a record never
    /// points at missing bytes. A failure between the two leaves an orphan
    /// object that the next identical submission adopts.
    #[instrument(skip(self, data, submission), fields(size = data.len()))]
    pub async fn submit(
        &self,
        data: &[u8],
        mut submission: Submission,
    ) -> Result<SubmitOutcome, ServiceError> {
        let size = data.len() as u64;
        if size > self.settings.max_file_size {
            return Err(ServiceError::TooLarge {
                actual: size,
                limit: self.settings.max_file_size,
            });
        }
        if data.is_empty() {
            return Err(ServiceError::Validation("File must not be empty".into()));
        }

        let sha256 = ContentHash::compute(data);
        submission.filename = sanitize_submission_filename(&submission.filename, &sha256.to_hex());
        self.record(sha256, size, submission, Some(data)).await
    }

    /// Record a submission for bytes already present in the samples bucket.
    #[instrument(skip(self, submission), fields(sha256 = %sha256))]
    pub async fn ingest_stored(
        &self,
        sha256: ContentHash,
        submission: Submission,
    ) -> Result<SubmitOutcome, ServiceError> {
        let key = sha256.to_hex();
        let size = match with_timeout(
            "sample lookup",
            self.settings.timeout,
            self.blobs.size(&self.settings.bucket, &key),
        )
        .await
        {
            Ok(size) => size,
            Err(ServiceError::Storage(StorageError::NotFound(_))) => {
                return Err(ServiceError::NotFound("Stored sample".into()));
            }
            Err(e) => return Err(e),
        };
        self.record(sha256, size, submission, None).await
    }

    async fn record(
        &self,
        sha256: ContentHash,
        size: u64,
        submission: Submission,
        data: Option<&[u8]>,
    ) -> Result<SubmitOutcome, ServiceError> {
        let key = sha256.to_hex();
        let policy = self.settings.write_policy;
        let mut blob_verified = false;
        let mut attempt: u8 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            let conflict = match self.files.get(&key).await? {
                None => {
                    if let Some(data) = data
                        && !blob_verified
                    {
                        self.put_sample(&key, data).await?;
                        blob_verified = true;
                    }
                    let record = FileRecord::new(sha256, size, submission.clone());
                    match self.files.insert(&key, record).await {
                        Ok(written) => {
                            info!(sha256 = %sha256, size, "New file stored");
                            return Ok(SubmitOutcome {
                                file: written.doc,
                                is_new: true,
                            });
                        }
                        Err(e) if e.is_conflict() => e,
                        Err(e) => return Err(e.into()),
                    }
                }
                Some(Versioned { version, mut doc }) => {
                    if let Some(data) = data
                        && !blob_verified
                    {
                        if !self.sample_exists(&key).await? {
                            warn!(sha256 = %sha256, "Sample object missing, re-uploading");
                            self.put_sample(&key, data).await?;
                        }
                        blob_verified = true;
                    }
                    doc.record_submission(submission.clone());
                    match self.files.replace(&key, doc, version).await {
                        Ok(written) => {
                            info!(
                                sha256 = %sha256,
                                submissions = written.doc.submissions.len(),
                                "Repeat submission recorded"
                            );
                            return Ok(SubmitOutcome {
                                file: written.doc,
                                is_new: false,
                            });
                        }
                        Err(e) if e.is_conflict() => e,
                        Err(e) => return Err(e.into()),
                    }
                }
            };

            if !policy.allows_retry(attempt) {
                return Err(conflict.into());
            }
            let delay = policy.delay(attempt);
            debug!(sha256 = %sha256, attempt, "File record changed concurrently, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    async fn put_sample(&self, key: &str, data: &[u8]) -> Result<(), ServiceError> {
        with_timeout(
            "sample upload",
            self.settings.timeout,
            self.blobs
                .put(&self.settings.bucket, key, data, SAMPLE_CONTENT_TYPE),
        )
        .await
    }

    async fn sample_exists(&self, key: &str) -> Result<bool, ServiceError> {
        with_timeout(
            "sample lookup",
            self.settings.timeout,
            self.blobs.exists(&self.settings.bucket, key),
        )
        .await
    }

    pub async fn get(&self, sha256: &ContentHash) -> Result<FileRecord, ServiceError> {
        self.files
            .get(&sha256.to_hex())
            .await?
            .map(|current| current.doc)
            .ok_or_else(|| ServiceError::NotFound("File".into()))
    }

    /// Fetch several records, silently skipping hashes without one.
    pub async fn get_many(&self, hashes: &[ContentHash]) -> Result<Vec<FileRecord>, ServiceError> {
        let keys: Vec<String> = hashes.iter().map(ContentHash::to_hex).collect();
        Ok(self.files.get_many(keys.iter().map(String::as_str)).await?)
    }

    /// Flip the dispatch-pending marker. A missing record is not an error.
    pub async fn set_dispatch_pending(
        &self,
        sha256: &ContentHash,
        pending: bool,
    ) -> Result<(), ServiceError> {
        self.files
            .update::<_, ServiceError, _>(&sha256.to_hex(), |file| {
                if file.dispatch_pending == pending {
                    return Ok(Mutation::Unchanged(()));
                }
                file.dispatch_pending = pending;
                Ok(Mutation::Changed(()))
            })
            .await?;
        Ok(())
    }

    /// Move a file through the status workflow.
    ///
    /// Returns `false` when the report was a duplicate or arrived out of
    /// order and left the record untouched.
    #[instrument(skip(self, analysis), fields(sha256 = %sha256, status = %next))]
    pub async fn apply_status(
        &self,
        sha256: &ContentHash,
        next: FileStatus,
        analysis: Option<serde_json::Value>,
    ) -> Result<bool, ServiceError> {
        let now = Utc::now();
        self.files
            .update::<_, ServiceError, _>(&sha256.to_hex(), |file| {
                Ok(if file.apply_status(next, analysis.clone(), now) {
                    Mutation::Changed(true)
                } else {
                    Mutation::Unchanged(false)
                })
            })
            .await?
            .ok_or_else(|| ServiceError::NotFound("File".into()))
    }

    /// The sample packed in a ZIP archive protected with [`ARCHIVE_PASSWORD`].
    #[instrument(skip(self), fields(sha256 = %sha256))]
    pub async fn download(&self, sha256: &ContentHash) -> Result<Vec<u8>, ServiceError> {
        self.get(sha256).await?;

        let key = sha256.to_hex();
        let data = match with_timeout(
            "sample download",
            self.settings.timeout,
            self.blobs.get(&self.settings.bucket, &key),
        )
        .await
        {
            Ok(data) => data,
            Err(ServiceError::Storage(StorageError::NotFound(_))) => {
                return Err(ServiceError::NotFound("Stored sample".into()));
            }
            Err(e) => return Err(e),
        };

        tokio::task::spawn_blocking(move || zip_protected(&key, &data))
            .await
            .map_err(|e| ServiceError::Internal(format!("archive task failed: {e}")))?
            .map_err(|e| ServiceError::Internal(format!("archive creation failed: {e}")))
    }

    /// Drop every file record. Sample objects are kept so they can be
    /// re-ingested.
    pub async fn purge(&self) -> Result<u64, ServiceError> {
        let removed = self.files.clear().await?;
        info!(removed, "File records purged");
        Ok(removed)
    }
}

fn zip_protected(name: &str, data: &[u8]) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .with_deprecated_encryption(ARCHIVE_PASSWORD)?;
    writer.start_file(name, options)?;
    writer.write_all(data)?;
    Ok(writer.finish()?.into_inner())
}
