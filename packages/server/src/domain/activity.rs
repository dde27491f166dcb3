use chrono::{DateTime, Utc};
use common::ContentHash;
use serde::{Deserialize, Serialize};

use super::user::Username;

/// What happened. Serialized as `{"type": ..., "content": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum ActivityKind {
    Submit {
        #[schema(value_type = String)]
        sha256: ContentHash,
    },
    Like {
        #[schema(value_type = String)]
        sha256: ContentHash,
    },
    Comment {
        #[schema(value_type = String)]
        sha256: ContentHash,
        body: String,
    },
    Follow {
        #[schema(value_type = String)]
        user: Username,
    },
}

/// Immutable timeline entry on the acting user's document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Activity {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ActivityKind,
}

impl Activity {
    pub fn now(kind: ActivityKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}
