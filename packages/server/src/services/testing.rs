use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::ContentHash;
use common::retry::BackoffPolicy;
use common::storage::filesystem::FilesystemObjectStore;
use common::storage::{BoxReader, ObjectStore, StorageError};
use tempfile::TempDir;

use super::*;
use crate::domain::{FileRecord, Submission, SubmissionSource, UserRecord, Username};
use crate::notify::{Email, EmailTemplate, MemoryNotifier, Notifier, NotifyError};
use crate::store::{Collection, MemoryStore};
use crate::tasks::BackgroundTasks;
use crate::utils::hash::hash_password;

pub const TEST_PASSWORD: &str = "password123";
pub const PUBLIC_URL: &str = "http://localhost:3000";

fn test_password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(TEST_PASSWORD).unwrap())
}

/// Object store wrapper counting the calls made against it.
pub struct CountingStore {
    pub inner: FilesystemObjectStore,
    puts: AtomicUsize,
    lookups: AtomicUsize,
}

impl CountingStore {
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Calls that only inspect an object (`exists`, `size`).
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(bucket, key, data, content_type).await
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> Result<BoxReader, StorageError> {
        self.inner.get_stream(bucket, key).await
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(bucket, key).await
    }

    async fn size(&self, bucket: &str, key: &str) -> Result<u64, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.size(bucket, key).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        self.inner.delete(bucket, key).await
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _email: &Email) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected(503))
    }
}

/// Every service wired over in-memory documents, a temp-dir object store
/// and a recording queue.
pub struct Harness {
    pub content: ContentAddressStore,
    pub submissions: SubmissionPipeline,
    pub ledger: SubmissionLedger,
    pub activity: ActivityFanout,
    pub social: SocialGraphMutator,
    pub comments: CommentSubsystem,
    pub accounts: AccountService,
    pub queue: Arc<MemoryJobQueue>,
    pub blobs: Arc<CountingStore>,
    pub notifier: Arc<MemoryNotifier>,
    pub files: Collection<FileRecord>,
    pub users: Collection<UserRecord>,
    _dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(64 * 1024 * 1024, None).await
    }

    pub async fn with_max_file_size(max_file_size: u64) -> Self {
        Self::build(max_file_size, None).await
    }

    pub async fn with_failing_mail() -> Self {
        Self::build(64 * 1024 * 1024, Some(Arc::new(FailingNotifier))).await
    }

    async fn build(max_file_size: u64, mail: Option<Arc<dyn Notifier>>) -> Self {
        let dir = TempDir::new().unwrap();
        let inner = FilesystemObjectStore::new(dir.path().to_path_buf(), u64::MAX)
            .await
            .unwrap();
        let blobs = Arc::new(CountingStore {
            inner,
            puts: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        });

        let docs = Arc::new(MemoryStore::new());
        let policy = BackoffPolicy::default();
        let files: Collection<FileRecord> = Collection::new(docs.clone(), policy);
        let users: Collection<UserRecord> = Collection::new(docs, policy);

        let content = ContentAddressStore::new(
            files.clone(),
            blobs.clone(),
            ContentStoreSettings {
                bucket: "samples".into(),
                max_file_size,
                timeout: Duration::from_secs(5),
                write_policy: policy,
            },
        );
        let queue = Arc::new(MemoryJobQueue::new());
        let dispatcher = ScanDispatcher::new(queue.clone(), "scan", Duration::from_secs(5));
        let ledger = SubmissionLedger::new(users.clone());
        let submissions = SubmissionPipeline::new(content.clone(), ledger.clone(), dispatcher);

        let notifier = Arc::new(MemoryNotifier::new());
        let mail = mail.unwrap_or_else(|| notifier.clone() as Arc<dyn Notifier>);
        let (tasks, _runner) = BackgroundTasks::start();
        let accounts = AccountService::new(
            users.clone(),
            blobs.clone(),
            mail,
            tasks,
            AccountSettings {
                jwt_secret: "test-secret".into(),
                session_ttl: chrono::Duration::hours(1),
                token_ttl: chrono::Duration::hours(1),
                public_url: PUBLIC_URL.into(),
                avatars_bucket: "avatars".into(),
                max_avatar_size: 100 * 1024,
                storage_timeout: Duration::from_secs(5),
            },
        );

        Self {
            activity: ActivityFanout::new(users.clone()),
            social: SocialGraphMutator::new(users.clone(), files.clone()),
            comments: CommentSubsystem::new(
                files.clone(),
                users.clone(),
                CommentSettings {
                    max_length: 4096,
                    mirror_deletes: false,
                },
            ),
            content,
            submissions,
            ledger,
            accounts,
            queue,
            blobs,
            notifier,
            files,
            users,
            _dir: dir,
        }
    }

    pub fn submission(&self, filename: &str) -> Submission {
        Submission {
            date: Utc::now(),
            filename: filename.to_string(),
            source: SubmissionSource::Web,
            country: None,
        }
    }

    /// A confirmed user with password [`TEST_PASSWORD`] and email `{name}@example.com`.
    pub async fn create_user(&self, name: &str) -> Username {
        let username = Username::parse(name).unwrap();
        let mut user = UserRecord::new(
            username.clone(),
            test_password_hash().to_string(),
            format!("{name}@example.com"),
        );
        user.confirmed = true;
        self.users.insert(username.as_str(), user).await.unwrap();
        username
    }

    pub async fn user(&self, name: &str) -> UserRecord {
        self.users.get(name).await.unwrap().unwrap().doc
    }

    /// Store `data` as a file record without dispatching it.
    pub async fn stored_file(&self, data: &[u8]) -> ContentHash {
        self.content
            .submit(data, self.submission("stored.bin"))
            .await
            .unwrap()
            .file
            .sha256
    }

    /// Wait for the background runner to deliver an email and return its link.
    pub async fn wait_for_email(&self, recipient: &str, template: EmailTemplate) -> String {
        for _ in 0..200 {
            if let Some(link) = self.notifier.last_link(recipient, template) {
                return link;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no {template:?} email sent to {recipient}");
    }
}
