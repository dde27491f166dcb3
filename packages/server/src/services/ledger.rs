use chrono::{DateTime, Utc};
use common::ContentHash;
use tracing::{debug, instrument};

use super::activity::ActivityFanout;
use super::error::ServiceError;
use crate::domain::{ActivityKind, UserRecord, UserSubmission, Username};
use crate::store::{Collection, Mutation};

/// Per-user attribution of first sightings.
///
/// Every sighting is kept on the file record itself; the ledger additionally
/// lists, on the submitter's document, the files they introduced.
#[derive(Clone)]
pub struct SubmissionLedger {
    users: Collection<UserRecord>,
}

impl SubmissionLedger {
    pub fn new(users: Collection<UserRecord>) -> Self {
        Self { users }
    }

    /// Attribute a first sighting to `actor` and record a `submit` activity.
    /// Returns `false` if the hash was already attributed to them.
    #[instrument(skip(self), fields(username = %actor, sha256 = %sha256))]
    pub async fn attribute(
        &self,
        actor: &Username,
        sha256: ContentHash,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let added = self
            .users
            .update::<_, ServiceError, _>(actor.as_str(), |user| {
                if !user.record_submission(sha256, timestamp) {
                    return Ok(Mutation::Unchanged(false));
                }
                ActivityFanout::append(user, ActivityKind::Submit { sha256 });
                Ok(Mutation::Changed(true))
            })
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".into()))?;
        if !added {
            debug!("Submission already attributed");
        }
        Ok(added)
    }

    pub async fn submissions_of(
        &self,
        username: &Username,
    ) -> Result<Vec<UserSubmission>, ServiceError> {
        self.users
            .get(username.as_str())
            .await?
            .map(|user| user.doc.submissions)
            .ok_or_else(|| ServiceError::NotFound("User".into()))
    }
}
