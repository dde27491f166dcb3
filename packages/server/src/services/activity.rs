use super::error::ServiceError;
use crate::domain::{Activity, ActivityKind, UserRecord, Username};
use crate::store::Collection;

/// Appends activities to the acting user's timeline and serves it back.
///
/// Activities triggered by a set change are appended with [`Self::append`]
/// inside the same document write as the change itself.
#[derive(Clone)]
pub struct ActivityFanout {
    users: Collection<UserRecord>,
}

impl ActivityFanout {
    pub fn new(users: Collection<UserRecord>) -> Self {
        Self { users }
    }

    pub fn append(user: &mut UserRecord, kind: ActivityKind) {
        user.record_activity(kind);
    }

    /// Most recent activities first.
    pub async fn timeline(
        &self,
        username: &Username,
        limit: usize,
    ) -> Result<Vec<Activity>, ServiceError> {
        let user = self
            .users
            .get(username.as_str())
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".into()))?;
        Ok(user.doc.activities.into_iter().rev().take(limit).collect())
    }
}
