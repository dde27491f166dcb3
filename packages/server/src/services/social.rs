use common::ContentHash;
use tracing::{info, instrument, warn};

use super::activity::ActivityFanout;
use super::error::ServiceError;
use crate::domain::{ActivityKind, FileRecord, UserRecord, Username};
use crate::store::{Collection, Mutation};

/// Follow and like relationships between users and files.
///
/// A follow touches two user documents. Each side is an independent,
/// idempotent update, so re-running an operation after a partial failure
/// converges to the intended state.
#[derive(Clone)]
pub struct SocialGraphMutator {
    users: Collection<UserRecord>,
    files: Collection<FileRecord>,
}

fn user_not_found() -> ServiceError {
    ServiceError::NotFound("User".into())
}

impl SocialGraphMutator {
    pub fn new(users: Collection<UserRecord>, files: Collection<FileRecord>) -> Self {
        Self { users, files }
    }

    async fn ensure_target(&self, actor: &Username, target: &Username) -> Result<(), ServiceError> {
        if actor == target {
            return Err(ServiceError::Validation(
                "Not allowed to follow yourself".into(),
            ));
        }
        if self.users.get(target.as_str()).await?.is_none() {
            return Err(user_not_found());
        }
        Ok(())
    }

    #[instrument(skip(self), fields(username = %actor, target = %target))]
    pub async fn follow(&self, actor: &Username, target: &Username) -> Result<(), ServiceError> {
        self.ensure_target(actor, target).await?;

        let added = self
            .users
            .update::<_, ServiceError, _>(actor.as_str(), |user| {
                if !user.follow(target) {
                    return Ok(Mutation::Unchanged(false));
                }
                ActivityFanout::append(
                    user,
                    ActivityKind::Follow {
                        user: target.clone(),
                    },
                );
                Ok(Mutation::Changed(true))
            })
            .await?
            .ok_or_else(user_not_found)?;

        self.users
            .update::<_, ServiceError, _>(target.as_str(), |user| {
                Ok(if user.add_follower(actor) {
                    Mutation::Changed(())
                } else {
                    Mutation::Unchanged(())
                })
            })
            .await
            .inspect_err(|e| {
                warn!(error = %e, "Follower side of follow failed; retry converges");
            })?
            .ok_or_else(user_not_found)?;

        if added {
            info!("User followed");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(username = %actor, target = %target))]
    pub async fn unfollow(&self, actor: &Username, target: &Username) -> Result<(), ServiceError> {
        self.ensure_target(actor, target).await?;

        self.users
            .update::<_, ServiceError, _>(actor.as_str(), |user| {
                Ok(if user.unfollow(target) {
                    Mutation::Changed(())
                } else {
                    Mutation::Unchanged(())
                })
            })
            .await?
            .ok_or_else(user_not_found)?;

        self.users
            .update::<_, ServiceError, _>(target.as_str(), |user| {
                Ok(if user.remove_follower(actor) {
                    Mutation::Changed(())
                } else {
                    Mutation::Unchanged(())
                })
            })
            .await
            .inspect_err(|e| {
                warn!(error = %e, "Follower side of unfollow failed; retry converges");
            })?
            .ok_or_else(user_not_found)?;

        Ok(())
    }

    /// Returns `true` if the like was new.
    #[instrument(skip(self), fields(username = %actor, sha256 = %sha256))]
    pub async fn like(&self, actor: &Username, sha256: &ContentHash) -> Result<bool, ServiceError> {
        if self.files.get(&sha256.to_hex()).await?.is_none() {
            return Err(ServiceError::NotFound("File".into()));
        }

        self.users
            .update::<_, ServiceError, _>(actor.as_str(), |user| {
                if !user.like(*sha256) {
                    return Ok(Mutation::Unchanged(false));
                }
                ActivityFanout::append(user, ActivityKind::Like { sha256: *sha256 });
                Ok(Mutation::Changed(true))
            })
            .await?
            .ok_or_else(user_not_found)
    }

    /// Returns `true` if a like was removed. Works for files that no longer
    /// exist, so stale likes can always be cleaned up.
    #[instrument(skip(self), fields(username = %actor, sha256 = %sha256))]
    pub async fn unlike(
        &self,
        actor: &Username,
        sha256: &ContentHash,
    ) -> Result<bool, ServiceError> {
        self.users
            .update::<_, ServiceError, _>(actor.as_str(), |user| {
                Ok(if user.unlike(sha256) {
                    Mutation::Changed(true)
                } else {
                    Mutation::Unchanged(false)
                })
            })
            .await?
            .ok_or_else(user_not_found)
    }

    async fn load(&self, username: &Username) -> Result<UserRecord, ServiceError> {
        self.users
            .get(username.as_str())
            .await?
            .map(|user| user.doc)
            .ok_or_else(user_not_found)
    }

    /// Liked files that still have a record, in like order.
    pub async fn liked_files(&self, username: &Username) -> Result<Vec<FileRecord>, ServiceError> {
        let user = self.load(username).await?;
        let keys: Vec<String> = user.likes.iter().map(ContentHash::to_hex).collect();
        Ok(self.files.get_many(keys.iter().map(String::as_str)).await?)
    }

    pub async fn following(&self, username: &Username) -> Result<Vec<Username>, ServiceError> {
        Ok(self.load(username).await?.following)
    }

    pub async fn followers(&self, username: &Username) -> Result<Vec<Username>, ServiceError> {
        Ok(self.load(username).await?.followers)
    }
}
