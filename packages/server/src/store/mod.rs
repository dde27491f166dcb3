//! Versioned JSON document storage.
//!
//! Every aggregate (file records, user records) is one JSON document keyed
//! inside a named collection. Each write bumps a per-document version, and
//! writes can be conditioned on the version the caller read, which is what
//! the read-modify-write loop in [`collection::Collection::update`] builds on.

mod collection;
mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use collection::{Collection, Document, Mutation, Versioned};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Monotonic per-document write counter. The first write yields 1.
pub type Version = u64;

/// A document as stored, before typed decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub key: String,
    pub version: Version,
    pub body: Value,
}

/// Precondition attached to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Unconditional create-or-replace.
    Any,
    /// The document must not exist yet.
    Absent,
    /// The document must still be at this version.
    Version(Version),
}

/// Selection for [`DocumentStore::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    /// Top-level string field equality, e.g. `email = "a@b.c"`.
    FieldEquals { field: String, value: String },
}

impl Filter {
    pub fn field_equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate the filter against a decoded body.
    pub fn matches(&self, body: &Value) -> bool {
        match self {
            Self::All => true,
            Self::FieldEquals { field, value } => {
                body.get(field).and_then(Value::as_str) == Some(value.as_str())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The write precondition did not hold.
    #[error("write conflict on {collection}/{key}")]
    Conflict { collection: String, key: String },

    #[error("document encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// The backend did not answer in time.
    #[error("document store call on {collection} timed out after {after:?}")]
    Timeout {
        collection: &'static str,
        after: Duration,
    },
}

impl StoreError {
    pub fn conflict(collection: &str, key: &str) -> Self {
        Self::Conflict {
            collection: collection.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Backend-neutral document storage with compare-and-set writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<RawDocument>, StoreError>;

    /// Write `body` under `collection/key` if `expect` holds, returning the
    /// new version. A failed precondition yields [`StoreError::Conflict`].
    async fn upsert(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expect: Expect,
    ) -> Result<Version, StoreError>;

    /// Documents matching `filter`, ordered by key.
    async fn query(&self, collection: &str, filter: &Filter)
    -> Result<Vec<RawDocument>, StoreError>;

    /// Returns `true` if a document was removed.
    async fn remove(&self, collection: &str, key: &str) -> Result<bool, StoreError>;

    /// Remove every document of a collection, returning how many were removed.
    async fn clear(&self, collection: &str) -> Result<u64, StoreError>;
}
