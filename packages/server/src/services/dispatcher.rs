use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{ContentHash, ScanJob};
use mq::Mq;
use mq::error::MqError;
use tracing::{info, instrument, warn};

use super::error::ServiceError;

/// Destination for scan jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, topic: &str, job: &ScanJob, timeout: Duration)
    -> Result<(), MqError>;
}

#[async_trait]
impl JobQueue for Mq {
    async fn enqueue(
        &self,
        topic: &str,
        job: &ScanJob,
        timeout: Duration,
    ) -> Result<(), MqError> {
        mq::publish_message(self, topic, job, timeout).await
    }
}

/// In-process queue that only records what was published.
///
/// Backs local development without a broker, and lets tests observe
/// dispatches or simulate an unavailable broker.
#[derive(Default)]
pub struct MemoryJobQueue {
    published: Mutex<Vec<(String, ScanJob)>>,
    unavailable: AtomicBool,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, ScanJob)> {
        self.published
            .lock()
            .map(|jobs| jobs.clone())
            .unwrap_or_default()
    }

    /// Number of jobs published for `sha256`.
    pub fn count_for(&self, sha256: &ContentHash) -> usize {
        self.published()
            .iter()
            .filter(|(_, job)| job.sha256 == *sha256)
            .count()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(
        &self,
        topic: &str,
        job: &ScanJob,
        _timeout: Duration,
    ) -> Result<(), MqError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MqError::Broker("queue unavailable".into()));
        }
        self.published
            .lock()
            .map_err(|_| MqError::Broker("queue state poisoned".into()))?
            .push((topic.to_string(), job.clone()));
        Ok(())
    }
}

/// Publishes one scan job per dispatch request. No deduplication: every
/// call produces a message, and consumers must tolerate repeats.
#[derive(Clone)]
pub struct ScanDispatcher {
    queue: Arc<dyn JobQueue>,
    topic: String,
    timeout: Duration,
}

impl ScanDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>, topic: impl Into<String>, timeout: Duration) -> Self {
        Self {
            queue,
            topic: topic.into(),
            timeout,
        }
    }

    #[instrument(skip(self), fields(topic = %self.topic))]
    pub async fn dispatch(&self, sha256: &ContentHash) -> Result<(), ServiceError> {
        let job = ScanJob { sha256: *sha256 };
        match self.queue.enqueue(&self.topic, &job, self.timeout).await {
            Ok(()) => {
                info!(sha256 = %sha256, "Scan job dispatched");
                Ok(())
            }
            Err(MqError::Timeout(after)) => {
                warn!(sha256 = %sha256, ?after, "Scan job publish timed out");
                Err(ServiceError::Timeout {
                    operation: "scan dispatch",
                    after,
                })
            }
            Err(e) => {
                warn!(sha256 = %sha256, error = %e, "Scan job publish failed");
                Err(ServiceError::Queue(e))
            }
        }
    }
}
