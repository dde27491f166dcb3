use serde::{Deserialize, Serialize};

use crate::domain::UserRecord;

/// Request body for user registration.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    /// Unique username (1-32 chars, alphanumeric and underscores).
    #[schema(example = "alice_wonder")]
    pub username: String,
    /// Password (8-128 characters).
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
}

/// Request body for user login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    /// Username of the account to log into.
    #[schema(example = "alice_wonder")]
    pub username: String,
    /// Account password.
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

/// Successful registration response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    #[schema(example = "alice_wonder")]
    pub username: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// Always `false`: a confirmation link is emailed.
    pub confirmed: bool,
}

impl From<UserRecord> for RegisterResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            username: user.username.into(),
            email: user.email,
            confirmed: user.confirmed,
        }
    }
}

/// Successful login response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// JWT bearer token.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    #[schema(example = "alice_wonder")]
    pub username: String,
    pub admin: bool,
}

/// Query string of the confirmation link.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ConfirmQuery {
    /// Token from the confirmation email.
    pub token: String,
}

/// Request body naming an account by email.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct EmailRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
}

/// Request body completing a password reset.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ResetPasswordRequest {
    /// Token from the reset email.
    pub token: String,
    /// New password (8-128 characters).
    pub password: String,
}

/// Plain acknowledgement.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Account confirmed")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
