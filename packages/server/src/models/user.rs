use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{UserRecord, Username};
use crate::error::AppError;

pub fn parse_username(raw: &str) -> Result<Username, AppError> {
    Username::parse(raw).map_err(AppError::Validation)
}

/// Public view of an account.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    #[schema(example = "alice_wonder")]
    pub username: String,
    pub member_since: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
    pub has_avatar: bool,
    pub admin: bool,
    pub submissions_count: usize,
    pub likes_count: usize,
    pub following_count: usize,
    pub followers_count: usize,
    pub comments_count: usize,
}

impl From<UserRecord> for ProfileResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            username: user.username.into(),
            member_since: user.member_since,
            last_seen: user.last_seen,
            has_avatar: user.has_avatar,
            admin: user.admin,
            submissions_count: user.submissions_count,
            likes_count: user.likes_count,
            following_count: user.following_count,
            followers_count: user.followers_count,
            comments_count: user.comments_count,
        }
    }
}

/// Action on another user, selected by `type`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UserAction {
    Follow,
    Unfollow,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct TimelineQuery {
    /// Maximum number of activities, newest first. Default 50, at most 500.
    #[param(example = 20)]
    pub limit: Option<usize>,
}

impl TimelineQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(50).clamp(1, 500)
    }
}
