use chrono::{DateTime, Utc};
use common::{ContentHash, FileStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::user::Username;
use crate::store::Document;

/// Channel a submission arrived through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionSource {
    Web,
    Api,
}

impl fmt::Display for SubmissionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Web => "web",
            Self::Api => "api",
        })
    }
}

impl FromStr for SubmissionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "api" => Ok(Self::Api),
            other => Err(format!("Unknown submission source '{other}'")),
        }
    }
}

/// One sighting of a file. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Submission {
    pub date: DateTime<Utc>,
    pub filename: String,
    pub source: SubmissionSource,
    /// Origin country as reported by the edge proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Comment {
    /// Time-sortable unique ID (UUIDv7).
    pub id: String,
    #[schema(value_type = String)]
    pub sha256: ContentHash,
    #[schema(value_type = String)]
    pub username: Username,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// The single record kept per distinct file content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FileRecord {
    #[schema(value_type = String, example = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    pub sha256: ContentHash,
    pub size: u64,
    pub status: FileStatus,
    pub first_submission: DateTime<Utc>,
    pub last_submission: DateTime<Utc>,
    #[serde(default)]
    pub last_scanned: Option<DateTime<Utc>>,
    pub submissions: Vec<Submission>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Set when the scan job for this file could not be published.
    #[serde(default)]
    pub dispatch_pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub analysis: Option<serde_json::Value>,
}

impl Document for FileRecord {
    const COLLECTION: &'static str = "files";
}

impl FileRecord {
    /// A freshly queued record for content seen for the first time.
    pub fn new(sha256: ContentHash, size: u64, first: Submission) -> Self {
        Self {
            sha256,
            size,
            status: FileStatus::Queued,
            first_submission: first.date,
            last_submission: first.date,
            last_scanned: None,
            submissions: vec![first],
            comments: Vec::new(),
            dispatch_pending: false,
            analysis: None,
        }
    }

    pub fn record_submission(&mut self, submission: Submission) {
        if submission.date > self.last_submission {
            self.last_submission = submission.date;
        }
        self.submissions.push(submission);
    }

    pub fn comment(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn remove_comment(&mut self, id: &str) -> Option<Comment> {
        let position = self.comments.iter().position(|c| c.id == id)?;
        Some(self.comments.remove(position))
    }

    /// Apply a worker-reported status. Returns `false` when the report is a
    /// duplicate or an out-of-order transition and was ignored.
    ///
    /// A `Finished` report on an already finished file carrying a different
    /// analysis is the result of a rescan whose `Processing` report was
    /// skipped or lost, and replaces the previous verdict.
    pub fn apply_status(
        &mut self,
        next: FileStatus,
        analysis: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> bool {
        let rescanned = self.status == FileStatus::Finished
            && next == FileStatus::Finished
            && analysis.is_some()
            && analysis != self.analysis;
        if !rescanned && !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next == FileStatus::Finished {
            self.last_scanned = Some(now);
            if analysis.is_some() {
                self.analysis = analysis;
            }
        }
        true
    }
}
