use chrono::Utc;
use common::ContentHash;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::activity::ActivityFanout;
use super::error::ServiceError;
use crate::domain::{ActivityKind, Comment, FileRecord, UserComment, UserRecord, Username};
use crate::store::{Collection, Mutation};

#[derive(Debug, Clone, Copy)]
pub struct CommentSettings {
    pub max_length: usize,
    /// Also drop the author-side copy when a comment is deleted.
    pub mirror_deletes: bool,
}

/// Comments live on the file record; the author's document keeps a copy.
#[derive(Clone)]
pub struct CommentSubsystem {
    files: Collection<FileRecord>,
    users: Collection<UserRecord>,
    settings: CommentSettings,
}

fn file_not_found() -> ServiceError {
    ServiceError::NotFound("File".into())
}

impl CommentSubsystem {
    pub fn new(
        files: Collection<FileRecord>,
        users: Collection<UserRecord>,
        settings: CommentSettings,
    ) -> Self {
        Self {
            files,
            users,
            settings,
        }
    }

    #[instrument(skip(self, body), fields(username = %actor, sha256 = %sha256))]
    pub async fn post(
        &self,
        actor: &Username,
        sha256: &ContentHash,
        body: &str,
    ) -> Result<Comment, ServiceError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ServiceError::Validation("Comment must not be empty".into()));
        }
        let length = body.chars().count();
        if length > self.settings.max_length {
            return Err(ServiceError::Validation(format!(
                "Comment is too long ({length} > {} characters)",
                self.settings.max_length
            )));
        }

        let comment = Comment {
            id: Uuid::now_v7().to_string(),
            sha256: *sha256,
            username: actor.clone(),
            body: body.to_string(),
            timestamp: Utc::now(),
        };

        self.files
            .update::<_, ServiceError, _>(&sha256.to_hex(), |file| {
                if file.comment(&comment.id).is_some() {
                    return Ok(Mutation::Unchanged(()));
                }
                file.comments.push(comment.clone());
                Ok(Mutation::Changed(()))
            })
            .await?
            .ok_or_else(file_not_found)?;
        info!(comment_id = %comment.id, "Comment posted");

        if let Err(e) = self.mirror(actor, &comment).await {
            warn!(
                comment_id = %comment.id,
                error = %e,
                "Failed to mirror comment onto author"
            );
        }
        Ok(comment)
    }

    async fn mirror(&self, actor: &Username, comment: &Comment) -> Result<(), ServiceError> {
        let copy = UserComment {
            id: comment.id.clone(),
            sha256: comment.sha256,
            body: comment.body.clone(),
            timestamp: comment.timestamp,
        };
        self.users
            .update::<_, ServiceError, _>(actor.as_str(), |user| {
                if !user.push_comment(copy.clone()) {
                    return Ok(Mutation::Unchanged(()));
                }
                ActivityFanout::append(
                    user,
                    ActivityKind::Comment {
                        sha256: comment.sha256,
                        body: comment.body.clone(),
                    },
                );
                Ok(Mutation::Changed(()))
            })
            .await?
            .ok_or_else(|| ServiceError::NotFound("User".into()))
    }

    /// Only the author may delete a comment.
    #[instrument(skip(self), fields(username = %actor, sha256 = %sha256))]
    pub async fn delete(
        &self,
        actor: &Username,
        sha256: &ContentHash,
        id: &str,
    ) -> Result<(), ServiceError> {
        let removed = self
            .files
            .update::<_, ServiceError, _>(&sha256.to_hex(), |file| {
                let Some(comment) = file.comment(id) else {
                    return Err(ServiceError::NotFound("Comment".into()));
                };
                if comment.username != *actor {
                    return Err(ServiceError::Unauthorized(
                        "Only the author can delete a comment".into(),
                    ));
                }
                Ok(Mutation::Changed(file.remove_comment(id)))
            })
            .await?
            .ok_or_else(file_not_found)?;

        if removed.is_some() {
            info!(comment_id = id, "Comment deleted");
        }

        if self.settings.mirror_deletes
            && let Err(e) = self
                .users
                .update::<_, ServiceError, _>(actor.as_str(), |user| {
                    Ok(if user.remove_comment(id) {
                        Mutation::Changed(())
                    } else {
                        Mutation::Unchanged(())
                    })
                })
                .await
        {
            warn!(
                comment_id = id,
                error = %e,
                "Failed to remove comment copy from author"
            );
        }
        Ok(())
    }

    pub async fn list(&self, sha256: &ContentHash) -> Result<Vec<Comment>, ServiceError> {
        self.files
            .get(&sha256.to_hex())
            .await?
            .map(|file| file.doc.comments)
            .ok_or_else(file_not_found)
    }

    /// The author-side copies, in posting order.
    pub async fn of_user(&self, username: &Username) -> Result<Vec<UserComment>, ServiceError> {
        self.users
            .get(username.as_str())
            .await?
            .map(|user| user.doc.comments)
            .ok_or_else(|| ServiceError::NotFound("User".into()))
    }
}
