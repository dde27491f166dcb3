use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::auth::{
    ConfirmQuery, EmailRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    RegisterResponse, ResetPasswordRequest,
};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/register",
    tag = "Auth",
    operation_id = "register",
    summary = "Register a new account",
    description = "Creates an unconfirmed account and emails a confirmation link. \
        Usernames are case-insensitive and stored lower-case.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Username or email taken (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .accounts
        .register(&payload.username, &payload.password, &payload.email)
        .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse::from(user))))
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Log in",
    description = "Exchanges credentials of a confirmed account for a session token.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Bad credentials or unconfirmed email (INVALID_CREDENTIALS, NOT_CONFIRMED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let session = state
        .accounts
        .login(&payload.username, &payload.password)
        .await?;

    Ok(Json(LoginResponse {
        token: session.token,
        username: session.user.username.into(),
        admin: session.user.admin,
    }))
}

#[utoipa::path(
    get,
    path = "/confirm",
    tag = "Auth",
    operation_id = "confirmAccount",
    summary = "Confirm an email address",
    description = "Target of the link sent after registration.",
    params(ConfirmQuery),
    responses(
        (status = 200, description = "Account confirmed", body = MessageResponse),
        (status = 401, description = "Invalid or expired token (TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Account no longer exists (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already confirmed (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn confirm(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ConfirmQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    state.accounts.confirm(&query.token).await?;
    Ok(Json(MessageResponse::new("Account confirmed")))
}

#[utoipa::path(
    post,
    path = "/resend-confirmation",
    tag = "Auth",
    operation_id = "resendConfirmation",
    summary = "Resend the confirmation email",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Confirmation email scheduled", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "No account with this email (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Account already confirmed (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn resend_confirmation(
    State(state): State<AppState>,
    AppJson(payload): AppJson<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.accounts.resend_confirmation(&payload.email).await?;
    Ok(Json(MessageResponse::new("Confirmation email sent")))
}

#[utoipa::path(
    post,
    path = "/reset-password",
    tag = "Auth",
    operation_id = "requestPasswordReset",
    summary = "Request a password reset email",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset email scheduled", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "No account with this email (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    AppJson(payload): AppJson<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.accounts.request_password_reset(&payload.email).await?;
    Ok(Json(MessageResponse::new("Password reset email sent")))
}

#[utoipa::path(
    post,
    path = "/reset-password/confirm",
    tag = "Auth",
    operation_id = "resetPassword",
    summary = "Set a new password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Invalid or expired token (TOKEN_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .accounts
        .reset_password(&payload.token, &payload.password)
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}
