use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::instrument;

use crate::domain::Comment;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::file::{CommentRequest, parse_sha256};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/{sha256}/comments",
    tag = "Comments",
    operation_id = "listComments",
    summary = "List comments on a file",
    description = "Oldest first.",
    params(("sha256" = String, Path, description = "SHA-256 of the content, hex")),
    responses(
        (status = 200, description = "Comments", body = Vec<Comment>),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(sha256): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let sha256 = parse_sha256(&sha256)?;
    Ok(Json(state.comments.list(&sha256).await?))
}

#[utoipa::path(
    post,
    path = "/{sha256}/comments",
    tag = "Comments",
    operation_id = "postComment",
    summary = "Comment on a file",
    params(("sha256" = String, Path, description = "SHA-256 of the content, hex")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment posted", body = Comment),
        (status = 400, description = "Empty or overlong comment (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(username = %auth_user.username))]
pub async fn post_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(sha256): Path<String>,
    AppJson(payload): AppJson<CommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sha256 = parse_sha256(&sha256)?;
    let comment = state
        .comments
        .post(&auth_user.username, &sha256, &payload.body)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    delete,
    path = "/{sha256}/comments/{id}",
    tag = "Comments",
    operation_id = "deleteComment",
    summary = "Delete a comment",
    description = "Only the author can delete a comment.",
    params(
        ("sha256" = String, Path, description = "SHA-256 of the content, hex"),
        ("id" = String, Path, description = "Comment ID"),
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the author (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "File or comment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(username = %auth_user.username))]
pub async fn delete_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((sha256, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let sha256 = parse_sha256(&sha256)?;
    state
        .comments
        .delete(&auth_user.username, &sha256, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
