use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use common::retry::BackoffPolicy;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{DocumentStore, Expect, Filter, RawDocument, StoreError, Version};

/// A typed aggregate stored as one JSON document.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    /// Hook run right before every write, used to refresh derived fields.
    fn before_write(&mut self) {}
}

/// A decoded document together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<D> {
    pub version: Version,
    pub doc: D,
}

/// Outcome of one application of an update closure.
pub enum Mutation<T> {
    /// The document was modified and must be written back.
    Changed(T),
    /// Nothing to write; the update is already reflected in the document.
    Unchanged(T),
}

/// Bound applied to every backend call unless overridden.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed view over one collection of a [`DocumentStore`].
pub struct Collection<D> {
    store: Arc<dyn DocumentStore>,
    policy: BackoffPolicy,
    timeout: Duration,
    _doc: PhantomData<fn() -> D>,
}

impl<D> Clone for Collection<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policy: self.policy,
            timeout: self.timeout,
            _doc: PhantomData,
        }
    }
}

impl<D: Document> Collection<D> {
    pub fn new(store: Arc<dyn DocumentStore>, policy: BackoffPolicy) -> Self {
        Self {
            store,
            policy,
            timeout: DEFAULT_CALL_TIMEOUT,
            _doc: PhantomData,
        }
    }

    /// Fail backend calls that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                collection: D::COLLECTION,
                after: self.timeout,
            }),
        }
    }

    fn decode(raw: RawDocument) -> Result<Versioned<D>, StoreError> {
        Ok(Versioned {
            version: raw.version,
            doc: serde_json::from_value(raw.body)?,
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<Versioned<D>>, StoreError> {
        self.bounded(self.store.get(D::COLLECTION, key))
            .await?
            .map(Self::decode)
            .transpose()
    }

    async fn write(&self, key: &str, mut doc: D, expect: Expect) -> Result<Versioned<D>, StoreError> {
        doc.before_write();
        let body = serde_json::to_value(&doc)?;
        let version = self
            .bounded(self.store.upsert(D::COLLECTION, key, body, expect))
            .await?;
        Ok(Versioned { version, doc })
    }

    /// Create a document; fails with a conflict if the key is taken.
    pub async fn insert(&self, key: &str, doc: D) -> Result<Versioned<D>, StoreError> {
        self.write(key, doc, Expect::Absent).await
    }

    /// Replace a document that must still be at `version`.
    pub async fn replace(
        &self,
        key: &str,
        doc: D,
        version: Version,
    ) -> Result<Versioned<D>, StoreError> {
        self.write(key, doc, Expect::Version(version)).await
    }

    pub async fn query(&self, filter: &Filter) -> Result<Vec<Versioned<D>>, StoreError> {
        self.bounded(self.store.query(D::COLLECTION, filter))
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    /// Decode several documents, skipping keys that do not exist.
    pub async fn get_many<'a, I>(&self, keys: I) -> Result<Vec<D>, StoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut found = Vec::new();
        for key in keys {
            if let Some(current) = self.get(key).await? {
                found.push(current.doc);
            }
        }
        Ok(found)
    }

    pub async fn clear(&self) -> Result<u64, StoreError> {
        self.bounded(self.store.clear(D::COLLECTION)).await
    }

    /// Read-modify-write with optimistic concurrency.
    ///
    /// `mutate` is re-applied to a fresh read whenever a concurrent writer
    /// got in between, so it must be a pure function of the document. An
    /// `Err` from `mutate` aborts without writing. Returns `Ok(None)` if the
    /// document does not exist.
    pub async fn update<T, E, F>(&self, key: &str, mut mutate: F) -> Result<Option<T>, E>
    where
        F: FnMut(&mut D) -> Result<Mutation<T>, E> + Send,
        E: From<StoreError>,
        T: Send,
    {
        let mut attempt: u8 = 0;
        loop {
            attempt = attempt.saturating_add(1);

            let Some(Versioned { version, mut doc }) = self.get(key).await? else {
                return Ok(None);
            };

            let outcome = match mutate(&mut doc)? {
                Mutation::Unchanged(outcome) => return Ok(Some(outcome)),
                Mutation::Changed(outcome) => outcome,
            };

            match self.replace(key, doc, version).await {
                Ok(_) => return Ok(Some(outcome)),
                Err(StoreError::Conflict { .. }) if self.policy.allows_retry(attempt) => {
                    let delay = self.policy.delay(attempt);
                    debug!(
                        collection = D::COLLECTION,
                        key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Write conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
