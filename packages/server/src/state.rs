use std::sync::Arc;
use std::time::Duration;

use common::storage::ObjectStore;

use crate::config::AppConfig;
use crate::domain::{FileRecord, UserRecord};
use crate::notify::Notifier;
use crate::services::{
    AccountService, AccountSettings, ActivityFanout, CommentSettings, CommentSubsystem,
    ContentAddressStore, ContentStoreSettings, JobQueue, ScanDispatcher, SocialGraphMutator,
    SubmissionLedger, SubmissionPipeline,
};
use crate::store::{Collection, DocumentStore};
use crate::tasks::BackgroundTasks;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub content: ContentAddressStore,
    pub submissions: SubmissionPipeline,
    pub ledger: SubmissionLedger,
    pub activity: ActivityFanout,
    pub social: SocialGraphMutator,
    pub comments: CommentSubsystem,
    pub accounts: AccountService,
    pub tasks: BackgroundTasks,
}

impl AppState {
    /// Wire every service over the given backends.
    pub fn build(
        config: AppConfig,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn ObjectStore>,
        queue: Arc<dyn JobQueue>,
        notifier: Arc<dyn Notifier>,
        tasks: BackgroundTasks,
    ) -> Self {
        let policy = config.documents.retry_policy();
        let storage_timeout = Duration::from_secs(config.storage.timeout_secs);
        let files: Collection<FileRecord> =
            Collection::new(docs.clone(), policy).with_timeout(config.documents.timeout());
        let users: Collection<UserRecord> =
            Collection::new(docs, policy).with_timeout(config.documents.timeout());

        let content = ContentAddressStore::new(
            files.clone(),
            blobs.clone(),
            ContentStoreSettings {
                bucket: config.storage.samples_bucket.clone(),
                max_file_size: config.storage.max_file_size,
                timeout: storage_timeout,
                write_policy: policy,
            },
        );
        let dispatcher = ScanDispatcher::new(
            queue,
            config.mq.scan_topic.clone(),
            Duration::from_secs(config.mq.publish_timeout_secs),
        );
        let ledger = SubmissionLedger::new(users.clone());
        let submissions = SubmissionPipeline::new(content.clone(), ledger.clone(), dispatcher);

        let accounts = AccountService::new(
            users.clone(),
            blobs,
            notifier,
            tasks.clone(),
            AccountSettings {
                jwt_secret: config.auth.jwt_secret.clone(),
                session_ttl: chrono::Duration::hours(config.auth.session_ttl_hours),
                token_ttl: chrono::Duration::minutes(config.auth.token_ttl_minutes),
                public_url: config.server.public_url.trim_end_matches('/').to_string(),
                avatars_bucket: config.storage.avatars_bucket.clone(),
                max_avatar_size: config.storage.max_avatar_size,
                storage_timeout,
            },
        );
        let comments = CommentSubsystem::new(
            files.clone(),
            users.clone(),
            CommentSettings {
                max_length: config.social.max_comment_length,
                mirror_deletes: config.social.mirror_comment_deletes,
            },
        );

        Self {
            activity: ActivityFanout::new(users.clone()),
            social: SocialGraphMutator::new(users, files),
            config: Arc::new(config),
            content,
            submissions,
            ledger,
            comments,
            accounts,
            tasks,
        }
    }
}
