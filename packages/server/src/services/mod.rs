//! Application services. Handlers translate HTTP into calls on these and
//! [`ServiceError`]s back into responses.

pub mod accounts;
pub mod activity;
pub mod comments;
pub mod content_store;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod social;
pub mod submissions;

#[cfg(test)]
pub(crate) mod testing;

pub use accounts::{AccountService, AccountSettings, Session};
pub use activity::ActivityFanout;
pub use comments::{CommentSettings, CommentSubsystem};
pub use content_store::{ContentAddressStore, ContentStoreSettings, SubmitOutcome};
pub use dispatcher::{JobQueue, MemoryJobQueue, ScanDispatcher};
pub use error::ServiceError;
pub use ledger::SubmissionLedger;
pub use social::SocialGraphMutator;
pub use submissions::{SubmissionPipeline, UploadMeta};
