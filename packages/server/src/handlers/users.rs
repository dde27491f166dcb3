use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::Json;
use tracing::instrument;

use crate::domain::{Activity, FileRecord, UserComment, UserSubmission};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::auth::MessageResponse;
use crate::models::user::{ProfileResponse, TimelineQuery, UserAction, parse_username};
use crate::state::AppState;

/// Body limit layer for avatar uploads. Oversized bodies that still fit are
/// rejected by the account service with a structured 413.
pub fn avatar_body_limit(max_avatar_size: u64) -> DefaultBodyLimit {
    let max = usize::try_from(max_avatar_size).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max.saturating_mul(2))
}

#[utoipa::path(
    get,
    path = "/{username}",
    tag = "Users",
    operation_id = "getProfile",
    summary = "Get a user's public profile",
    params(("username" = String, Path, description = "Username (case-insensitive)")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let username = parse_username(&username)?;
    let user = state.accounts.profile(&username).await?;
    Ok(Json(ProfileResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/{username}/actions",
    tag = "Users",
    operation_id = "userAction",
    summary = "Follow or unfollow a user",
    description = "Both actions are idempotent and safe to retry.",
    params(("username" = String, Path, description = "User to follow or unfollow")),
    request_body = UserAction,
    responses(
        (status = 200, description = "Action applied", body = MessageResponse),
        (status = 400, description = "Unknown action or self-follow (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(username = %auth_user.username))]
pub async fn user_action(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(target): Path<String>,
    AppJson(action): AppJson<UserAction>,
) -> Result<Json<MessageResponse>, AppError> {
    let target = parse_username(&target)?;
    let message = match action {
        UserAction::Follow => {
            state.social.follow(&auth_user.username, &target).await?;
            format!("Following {target}")
        }
        UserAction::Unfollow => {
            state.social.unfollow(&auth_user.username, &target).await?;
            format!("No longer following {target}")
        }
    };
    Ok(Json(MessageResponse::new(message)))
}

#[utoipa::path(
    get,
    path = "/{username}/activities",
    tag = "Users",
    operation_id = "getActivities",
    summary = "A user's activity timeline",
    description = "Newest first.",
    params(
        ("username" = String, Path, description = "Username"),
        TimelineQuery,
    ),
    responses(
        (status = 200, description = "Activities", body = Vec<Activity>),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn get_activities(
    State(state): State<AppState>,
    Path(username): Path<String>,
    AppQuery(query): AppQuery<TimelineQuery>,
) -> Result<Json<Vec<Activity>>, AppError> {
    let username = parse_username(&username)?;
    Ok(Json(
        state.activity.timeline(&username, query.limit()).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/{username}/likes",
    tag = "Users",
    operation_id = "getLikes",
    summary = "Files a user liked",
    description = "Liked files that no longer exist are left out.",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Liked files", body = Vec<FileRecord>),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_likes(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<FileRecord>>, AppError> {
    let username = parse_username(&username)?;
    Ok(Json(state.social.liked_files(&username).await?))
}

#[utoipa::path(
    get,
    path = "/{username}/following",
    tag = "Users",
    operation_id = "getFollowing",
    summary = "Users this user follows",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Usernames", body = Vec<String>),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let username = parse_username(&username)?;
    let following = state.social.following(&username).await?;
    Ok(Json(following.into_iter().map(String::from).collect()))
}

#[utoipa::path(
    get,
    path = "/{username}/followers",
    tag = "Users",
    operation_id = "getFollowers",
    summary = "Users following this user",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Usernames", body = Vec<String>),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let username = parse_username(&username)?;
    let followers = state.social.followers(&username).await?;
    Ok(Json(followers.into_iter().map(String::from).collect()))
}

#[utoipa::path(
    get,
    path = "/{username}/comments",
    tag = "Users",
    operation_id = "getUserComments",
    summary = "Comments written by a user",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Comments", body = Vec<UserComment>),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_user_comments(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserComment>>, AppError> {
    let username = parse_username(&username)?;
    Ok(Json(state.comments.of_user(&username).await?))
}

#[utoipa::path(
    get,
    path = "/{username}/submissions",
    tag = "Users",
    operation_id = "getUserSubmissions",
    summary = "Files first submitted by a user",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Submissions", body = Vec<UserSubmission>),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_user_submissions(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserSubmission>>, AppError> {
    let username = parse_username(&username)?;
    Ok(Json(state.ledger.submissions_of(&username).await?))
}

#[utoipa::path(
    get,
    path = "/{username}/avatar",
    tag = "Users",
    operation_id = "getAvatar",
    summary = "Download a user's avatar",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Avatar image"),
        (status = 404, description = "User or avatar not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_avatar(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let username = parse_username(&username)?;
    let (data, content_type) = state.accounts.avatar(&username).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

#[utoipa::path(
    put,
    path = "/{username}/avatar",
    tag = "Users",
    operation_id = "updateAvatar",
    summary = "Replace your avatar",
    description = "The request body is the raw image (PNG, JPEG, GIF or WebP).",
    params(("username" = String, Path, description = "Your own username")),
    request_body(content_type = "application/octet-stream", description = "Image bytes"),
    responses(
        (status = 200, description = "Avatar updated", body = MessageResponse),
        (status = 400, description = "Not an image (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not your account (PERMISSION_DENIED)", body = ErrorBody),
        (status = 413, description = "Image too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, body), fields(username = %auth_user.username))]
pub async fn update_avatar(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let username = parse_username(&username)?;
    let limit = state.config.storage.max_avatar_size;
    let body = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge { limit }
        } else {
            AppError::Validation(e.body_text())
        }
    })?;

    state
        .accounts
        .update_avatar(&auth_user.username, &username, &body)
        .await?;
    Ok(Json(MessageResponse::new("Avatar updated")))
}
