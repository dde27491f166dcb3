use common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Parse a hex SHA-256 path segment (case-insensitive).
pub fn parse_sha256(raw: &str) -> Result<ContentHash, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation("Invalid SHA-256 hash".into()))
}

/// Query parameters of a file upload.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct UploadQuery {
    /// Submission channel: `web` (default) or `api`.
    #[param(example = "api")]
    pub source: Option<String>,
}

/// Action on a file, selected by `type`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileAction {
    /// Publish a new scan job.
    Rescan,
    Like,
    Unlike,
}

/// Result of a file action.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileActionResponse {
    #[schema(example = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    pub sha256: String,
    #[schema(example = "like")]
    pub action: &'static str,
    /// `false` when the action was already in effect.
    pub changed: bool,
}

/// Request body for posting a comment.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CommentRequest {
    #[schema(example = "Drops a second stage from a paste site")]
    pub body: String,
}
