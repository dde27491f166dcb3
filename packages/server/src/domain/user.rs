use chrono::{DateTime, Utc};
use common::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::activity::{Activity, ActivityKind};
use super::{insert_unique, remove_item};
use crate::store::Document;

/// Canonical (lower-case) account name. Also the user document key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validate and normalize user input (1-32 chars, ASCII letters, digits, `_`).
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().count() > 32 {
            return Err("Username must be 1-32 characters".into());
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err("Username must contain only letters, digits, and underscores".into());
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A first-time submission attributed to this user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserSubmission {
    #[schema(value_type = String)]
    pub sha256: ContentHash,
    pub timestamp: DateTime<Utc>,
}

/// Author-side copy of a posted comment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserComment {
    pub id: String,
    #[schema(value_type = String)]
    pub sha256: ContentHash,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: Username,
    /// Argon2 PHC string.
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub has_avatar: bool,
    pub member_since: DateTime<Utc>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub submissions: Vec<UserSubmission>,
    #[serde(default)]
    pub submissions_count: usize,
    #[serde(default)]
    pub likes: Vec<ContentHash>,
    #[serde(default)]
    pub likes_count: usize,
    #[serde(default)]
    pub following: Vec<Username>,
    #[serde(default)]
    pub following_count: usize,
    #[serde(default)]
    pub followers: Vec<Username>,
    #[serde(default)]
    pub followers_count: usize,
    #[serde(default)]
    pub comments: Vec<UserComment>,
    #[serde(default)]
    pub comments_count: usize,
}

impl Document for UserRecord {
    const COLLECTION: &'static str = "users";

    fn before_write(&mut self) {
        self.submissions_count = self.submissions.len();
        self.likes_count = self.likes.len();
        self.following_count = self.following.len();
        self.followers_count = self.followers.len();
        self.comments_count = self.comments.len();
    }
}

impl UserRecord {
    pub fn new(username: Username, password_hash: String, email: String) -> Self {
        Self {
            username,
            password: password_hash,
            email,
            confirmed: false,
            admin: false,
            has_avatar: false,
            member_since: Utc::now(),
            last_seen: None,
            activities: Vec::new(),
            submissions: Vec::new(),
            submissions_count: 0,
            likes: Vec::new(),
            likes_count: 0,
            following: Vec::new(),
            following_count: 0,
            followers: Vec::new(),
            followers_count: 0,
            comments: Vec::new(),
            comments_count: 0,
        }
    }

    pub fn record_activity(&mut self, kind: ActivityKind) {
        self.activities.push(Activity::now(kind));
    }

    pub fn follow(&mut self, target: &Username) -> bool {
        insert_unique(&mut self.following, target.clone())
    }

    pub fn unfollow(&mut self, target: &Username) -> bool {
        remove_item(&mut self.following, target)
    }

    pub fn add_follower(&mut self, follower: &Username) -> bool {
        insert_unique(&mut self.followers, follower.clone())
    }

    pub fn remove_follower(&mut self, follower: &Username) -> bool {
        remove_item(&mut self.followers, follower)
    }

    pub fn like(&mut self, sha256: ContentHash) -> bool {
        insert_unique(&mut self.likes, sha256)
    }

    pub fn unlike(&mut self, sha256: &ContentHash) -> bool {
        remove_item(&mut self.likes, sha256)
    }

    /// Attribute a first sighting; a hash is attributed at most once.
    pub fn record_submission(&mut self, sha256: ContentHash, timestamp: DateTime<Utc>) -> bool {
        if self.submissions.iter().any(|s| s.sha256 == sha256) {
            return false;
        }
        self.submissions.push(UserSubmission { sha256, timestamp });
        true
    }

    pub fn push_comment(&mut self, comment: UserComment) -> bool {
        if self.comments.iter().any(|c| c.id == comment.id) {
            return false;
        }
        self.comments.push(comment);
        true
    }

    pub fn remove_comment(&mut self, id: &str) -> bool {
        let before = self.comments.len();
        self.comments.retain(|c| c.id != id);
        self.comments.len() != before
    }
}
