use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;

use super::{DocumentStore, Expect, Filter, RawDocument, StoreError, Version};

/// In-process document store used for tests and single-node development.
#[derive(Default)]
pub struct MemoryStore {
    docs: DashMap<(String, String), (Version, Value)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<RawDocument>, StoreError> {
        Ok(self
            .docs
            .get(&(collection.to_string(), key.to_string()))
            .map(|entry| {
                let (version, body) = entry.value();
                RawDocument {
                    key: key.to_string(),
                    version: *version,
                    body: body.clone(),
                }
            }))
    }

    async fn upsert(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expect: Expect,
    ) -> Result<Version, StoreError> {
        // The entry guard holds the shard lock, making check-and-write atomic.
        match self.docs.entry((collection.to_string(), key.to_string())) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get().0;
                match expect {
                    Expect::Any => {}
                    Expect::Version(v) if v == current => {}
                    Expect::Absent | Expect::Version(_) => {
                        return Err(StoreError::conflict(collection, key));
                    }
                }
                let next = current + 1;
                occupied.insert((next, body));
                Ok(next)
            }
            Entry::Vacant(vacant) => match expect {
                Expect::Any | Expect::Absent => {
                    vacant.insert((1, body));
                    Ok(1)
                }
                Expect::Version(_) => Err(StoreError::conflict(collection, key)),
            },
        }
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<RawDocument>, StoreError> {
        let mut found: Vec<RawDocument> = self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection && filter.matches(&entry.value().1))
            .map(|entry| RawDocument {
                key: entry.key().1.clone(),
                version: entry.value().0,
                body: entry.value().1.clone(),
            })
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .docs
            .remove(&(collection.to_string(), key.to_string()))
            .is_some())
    }

    async fn clear(&self, collection: &str) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        self.docs.retain(|(name, _), _| {
            let keep = name != collection;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
