use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::storage::{ObjectStore, StorageError};
use tracing::{info, instrument, warn};

use super::error::{ServiceError, with_timeout};
use crate::domain::{UserRecord, Username};
use crate::notify::{Email, EmailTemplate, Notifier};
use crate::store::{Collection, Filter, Mutation};
use crate::tasks::BackgroundTasks;
use crate::utils::hash::{hash_password, verify_password};
use crate::utils::jwt::{self, TokenPurpose};

const MIN_PASSWORD_CHARS: usize = 8;
const MAX_PASSWORD_CHARS: usize = 128;

#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    /// Lifetime of confirmation and password reset tokens.
    pub token_ttl: chrono::Duration,
    /// Base URL used to build links in emails.
    pub public_url: String,
    pub avatars_bucket: String,
    pub max_avatar_size: u64,
    pub storage_timeout: Duration,
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserRecord,
}

/// Registration, email confirmation, login, password reset and avatars.
#[derive(Clone)]
pub struct AccountService {
    users: Collection<UserRecord>,
    blobs: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    tasks: BackgroundTasks,
    settings: Arc<AccountSettings>,
}

fn user_not_found() -> ServiceError {
    ServiceError::NotFound("User".into())
}

fn validate_password(password: &str) -> Result<(), ServiceError> {
    let length = password.chars().count();
    if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&length) {
        return Err(ServiceError::Validation(format!(
            "Password must be {MIN_PASSWORD_CHARS}-{MAX_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

/// Normalize and shape-check an email address.
fn normalize_email(raw: &str) -> Result<String, ServiceError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email.len() <= 254
        && !email.chars().any(char::is_whitespace)
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
    if valid {
        Ok(email)
    } else {
        Err(ServiceError::Validation("Invalid email address".into()))
    }
}

/// Recognize the image formats accepted as avatars.
pub fn sniff_image(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

async fn hash_blocking(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| ServiceError::Internal(format!("password hash error: {e}")))
}

impl AccountService {
    pub fn new(
        users: Collection<UserRecord>,
        blobs: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        tasks: BackgroundTasks,
        settings: AccountSettings,
    ) -> Self {
        Self {
            users,
            blobs,
            notifier,
            tasks,
            settings: Arc::new(settings),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.settings.jwt_secret
    }

    #[instrument(skip(self, password, email), fields(username = %username))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<UserRecord, ServiceError> {
        let username = Username::parse(username).map_err(ServiceError::Validation)?;
        validate_password(password)?;
        let email = normalize_email(email)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".into()));
        }

        let hash = hash_blocking(password.to_string()).await?;
        let user = UserRecord::new(username.clone(), hash, email);
        let created = match self.users.insert(username.as_str(), user).await {
            Ok(created) => created.doc,
            Err(e) if e.is_conflict() => {
                return Err(ServiceError::Conflict("Username already taken".into()));
            }
            Err(e) => return Err(e.into()),
        };
        info!("User registered");

        self.send_token_email(&created, TokenPurpose::Confirm)?;
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        Ok(self
            .users
            .query(&Filter::field_equals("email", email))
            .await?
            .into_iter()
            .next()
            .map(|found| found.doc))
    }

    /// Queue an email carrying a token for `purpose`. Delivery happens in the
    /// background and its failure is only logged.
    fn send_token_email(&self, user: &UserRecord, purpose: TokenPurpose) -> Result<(), ServiceError> {
        let (template, path) = match purpose {
            TokenPurpose::Confirm => (EmailTemplate::Confirm, "api/v1/auth/confirm"),
            TokenPurpose::Reset => (EmailTemplate::Reset, "reset-password"),
            TokenPurpose::Session => {
                return Err(ServiceError::Internal("session tokens are never mailed".into()));
            }
        };
        let token = jwt::sign(
            user.username.as_str(),
            false,
            purpose,
            self.settings.token_ttl,
            &self.settings.jwt_secret,
        )
        .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))?;

        let email = Email {
            username: user.username.to_string(),
            recipient: user.email.clone(),
            link: format!(
                "{}/{path}?token={token}",
                self.settings.public_url.trim_end_matches('/')
            ),
            template,
        };
        let notifier = self.notifier.clone();
        self.tasks.submit("send_email", async move {
            notifier.send(&email).await?;
            Ok(())
        });
        Ok(())
    }

    /// Decode a mailed token, requiring `purpose`.
    fn token_subject(&self, token: &str, purpose: TokenPurpose) -> Result<Username, ServiceError> {
        let claims = jwt::verify(token, &self.settings.jwt_secret)
            .map_err(|_| ServiceError::InvalidToken)?;
        if claims.purpose != purpose {
            return Err(ServiceError::InvalidToken);
        }
        Username::parse(&claims.sub).map_err(|_| ServiceError::InvalidToken)
    }

    #[instrument(skip_all)]
    pub async fn confirm(&self, token: &str) -> Result<(), ServiceError> {
        let username = self.token_subject(token, TokenPurpose::Confirm)?;
        self.users
            .update::<_, ServiceError, _>(username.as_str(), |user| {
                if user.confirmed {
                    return Err(ServiceError::Conflict("Account already confirmed".into()));
                }
                user.confirmed = true;
                Ok(Mutation::Changed(()))
            })
            .await?
            .ok_or_else(user_not_found)?;
        info!(username = %username, "Account confirmed");
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn resend_confirmation(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email)?;
        let user = self.find_by_email(&email).await?.ok_or_else(user_not_found)?;
        if user.confirmed {
            return Err(ServiceError::Conflict("Account already confirmed".into()));
        }
        self.send_token_email(&user, TokenPurpose::Confirm)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ServiceError> {
        let username = Username::parse(username).map_err(|_| ServiceError::InvalidCredentials)?;
        let user = self
            .users
            .get(username.as_str())
            .await?
            .ok_or(ServiceError::InvalidCredentials)?
            .doc;

        let stored = user.password.clone();
        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| ServiceError::Internal(format!("verification task failed: {e}")))?
            .map_err(|e| ServiceError::Internal(format!("stored password hash is invalid: {e}")))?;
        if !valid {
            return Err(ServiceError::InvalidCredentials);
        }
        if !user.confirmed {
            return Err(ServiceError::NotConfirmed);
        }

        let now = Utc::now();
        let user = match self
            .users
            .update::<_, ServiceError, _>(username.as_str(), |user| {
                user.last_seen = Some(now);
                Ok(Mutation::Changed(user.clone()))
            })
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => return Err(ServiceError::InvalidCredentials),
            Err(e) => {
                warn!(error = %e, "Failed to record last seen time");
                user
            }
        };

        let token = jwt::sign(
            username.as_str(),
            user.admin,
            TokenPurpose::Session,
            self.settings.session_ttl,
            &self.settings.jwt_secret,
        )
        .map_err(|e| ServiceError::Internal(format!("token signing failed: {e}")))?;
        info!(username = %username, "User logged in");
        Ok(Session { token, user })
    }

    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email)?;
        let user = self.find_by_email(&email).await?.ok_or_else(user_not_found)?;
        self.send_token_email(&user, TokenPurpose::Reset)
    }

    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ServiceError> {
        let username = self.token_subject(token, TokenPurpose::Reset)?;
        validate_password(new_password)?;
        let hash = hash_blocking(new_password.to_string()).await?;

        self.users
            .update::<_, ServiceError, _>(username.as_str(), |user| {
                user.password = hash.clone();
                Ok(Mutation::Changed(()))
            })
            .await?
            .ok_or_else(user_not_found)?;
        info!(username = %username, "Password reset");
        Ok(())
    }

    pub async fn profile(&self, username: &Username) -> Result<UserRecord, ServiceError> {
        self.users
            .get(username.as_str())
            .await?
            .map(|user| user.doc)
            .ok_or_else(user_not_found)
    }

    #[instrument(skip(self, data), fields(username = %actor, size = data.len()))]
    pub async fn update_avatar(
        &self,
        actor: &Username,
        username: &Username,
        data: &[u8],
    ) -> Result<(), ServiceError> {
        if actor != username {
            return Err(ServiceError::Unauthorized(
                "Only the owner can change an avatar".into(),
            ));
        }
        let size = data.len() as u64;
        if size > self.settings.max_avatar_size {
            return Err(ServiceError::TooLarge {
                actual: size,
                limit: self.settings.max_avatar_size,
            });
        }
        let content_type = sniff_image(data).ok_or_else(|| {
            ServiceError::Validation("Avatar must be a PNG, JPEG, GIF or WebP image".into())
        })?;
        self.profile(username).await?;

        with_timeout(
            "avatar upload",
            self.settings.storage_timeout,
            self.blobs.put(
                &self.settings.avatars_bucket,
                username.as_str(),
                data,
                content_type,
            ),
        )
        .await?;

        self.users
            .update::<_, ServiceError, _>(username.as_str(), |user| {
                if user.has_avatar {
                    return Ok(Mutation::Unchanged(()));
                }
                user.has_avatar = true;
                Ok(Mutation::Changed(()))
            })
            .await?
            .ok_or_else(user_not_found)?;
        info!("Avatar updated");
        Ok(())
    }

    /// Avatar bytes and their content type.
    pub async fn avatar(&self, username: &Username) -> Result<(Vec<u8>, &'static str), ServiceError> {
        let user = self.profile(username).await?;
        if !user.has_avatar {
            return Err(ServiceError::NotFound("Avatar".into()));
        }
        let data = match with_timeout(
            "avatar download",
            self.settings.storage_timeout,
            self.blobs
                .get(&self.settings.avatars_bucket, username.as_str()),
        )
        .await
        {
            Ok(data) => data,
            Err(ServiceError::Storage(StorageError::NotFound(_))) => {
                return Err(ServiceError::NotFound("Avatar".into()));
            }
            Err(e) => return Err(e),
        };
        let content_type = sniff_image(&data).unwrap_or("application/octet-stream");
        Ok((data, content_type))
    }

    /// Create the configured administrator, or promote an existing account.
    #[instrument(skip(self, password, email))]
    pub async fn ensure_admin(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<(), ServiceError> {
        let username = Username::parse(username).map_err(ServiceError::Validation)?;
        let promoted = self
            .users
            .update::<_, ServiceError, _>(username.as_str(), |user| {
                if user.admin && user.confirmed {
                    return Ok(Mutation::Unchanged(false));
                }
                user.admin = true;
                user.confirmed = true;
                Ok(Mutation::Changed(true))
            })
            .await?;
        match promoted {
            Some(true) => info!("Existing user promoted to admin"),
            Some(false) => info!("Admin user already present"),
            None => {
                validate_password(password)?;
                let email = normalize_email(email)?;
                let mut admin =
                    UserRecord::new(username.clone(), hash_blocking(password.into()).await?, email);
                admin.admin = true;
                admin.confirmed = true;
                match self.users.insert(username.as_str(), admin).await {
                    Ok(_) => info!("Admin user created"),
                    Err(e) if e.is_conflict() => info!("Admin user created concurrently"),
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }
}
