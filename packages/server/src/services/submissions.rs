use chrono::Utc;
use common::ContentHash;
use tracing::{error, instrument, warn};

use super::content_store::{ContentAddressStore, SubmitOutcome};
use super::dispatcher::ScanDispatcher;
use super::error::ServiceError;
use super::ledger::SubmissionLedger;
use crate::domain::{Submission, SubmissionSource, Username};

/// Client-supplied details of an upload.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub filename: String,
    pub source: SubmissionSource,
    pub country: Option<String>,
}

/// Submit, attribute and dispatch, in that order.
///
/// Persistence is never rolled back when dispatch fails: the record is
/// flagged `dispatch_pending` and the error is returned, so a client retry or
/// an explicit rescan can publish the job later.
#[derive(Clone)]
pub struct SubmissionPipeline {
    content: ContentAddressStore,
    ledger: SubmissionLedger,
    dispatcher: ScanDispatcher,
}

impl SubmissionPipeline {
    pub fn new(
        content: ContentAddressStore,
        ledger: SubmissionLedger,
        dispatcher: ScanDispatcher,
    ) -> Self {
        Self {
            content,
            ledger,
            dispatcher,
        }
    }

    #[instrument(skip(self, data, meta), fields(username = %actor, size = data.len()))]
    pub async fn submit(
        &self,
        actor: &Username,
        data: &[u8],
        meta: UploadMeta,
    ) -> Result<SubmitOutcome, ServiceError> {
        let submission = Submission {
            date: Utc::now(),
            filename: meta.filename,
            source: meta.source,
            country: meta.country,
        };
        let mut outcome = self.content.submit(data, submission).await?;

        if outcome.is_new
            && let Err(e) = self
                .ledger
                .attribute(actor, outcome.file.sha256, outcome.file.first_submission)
                .await
        {
            warn!(
                sha256 = %outcome.file.sha256,
                error = %e,
                "Failed to attribute submission to user"
            );
        }

        self.dispatch(&outcome.file.sha256, outcome.file.dispatch_pending)
            .await?;
        outcome.file.dispatch_pending = false;
        Ok(outcome)
    }

    /// Register bytes already pushed to the samples bucket and dispatch them.
    #[instrument(skip(self, country), fields(sha256 = %sha256))]
    pub async fn ingest_stored(
        &self,
        sha256: ContentHash,
        country: Option<String>,
    ) -> Result<SubmitOutcome, ServiceError> {
        let submission = Submission {
            date: Utc::now(),
            filename: sha256.to_hex(),
            source: SubmissionSource::Api,
            country,
        };
        let mut outcome = self.content.ingest_stored(sha256, submission).await?;
        self.dispatch(&sha256, outcome.file.dispatch_pending).await?;
        outcome.file.dispatch_pending = false;
        Ok(outcome)
    }

    /// Dispatch an existing file again, whatever its status.
    #[instrument(skip(self), fields(sha256 = %sha256))]
    pub async fn rescan(&self, sha256: &ContentHash) -> Result<(), ServiceError> {
        let file = self.content.get(sha256).await?;
        self.dispatch(sha256, file.dispatch_pending).await
    }

    async fn dispatch(&self, sha256: &ContentHash, was_pending: bool) -> Result<(), ServiceError> {
        match self.dispatcher.dispatch(sha256).await {
            Ok(()) => {
                if was_pending
                    && let Err(e) = self.content.set_dispatch_pending(sha256, false).await
                {
                    warn!(sha256 = %sha256, error = %e, "Failed to clear dispatch marker");
                }
                Ok(())
            }
            Err(dispatch_err) => {
                if let Err(e) = self.content.set_dispatch_pending(sha256, true).await {
                    error!(sha256 = %sha256, error = %e, "Failed to flag undispatched file");
                }
                Err(dispatch_err)
            }
        }
    }
}
