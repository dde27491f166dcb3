use axum::{extract::FromRequestParts, http::request::Parts};

use crate::domain::Username;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt::{self, TokenPurpose};

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication. Only session
/// tokens are accepted; confirmation and reset tokens are rejected.
pub struct AuthUser {
    pub username: Username,
    pub admin: bool,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.admin {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "Administrator privileges required".into(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(token, state.accounts.jwt_secret())
            .map_err(|_| AppError::TokenInvalid)?;
        if claims.purpose != TokenPurpose::Session {
            return Err(AppError::TokenInvalid);
        }
        let username = Username::parse(&claims.sub).map_err(|_| AppError::TokenInvalid)?;

        Ok(AuthUser {
            username,
            admin: claims.admin,
        })
    }
}
