use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::Json;
use tracing::{info, instrument};

use crate::domain::{FileRecord, SubmissionSource};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::auth::MessageResponse;
use crate::models::file::{FileAction, FileActionResponse, UploadQuery, parse_sha256};
use crate::services::{SubmitOutcome, UploadMeta};
use crate::state::AppState;

/// Header set by the edge proxy with the client's country code.
pub const COUNTRY_HEADER: &str = "X-Geoip-Country";

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Body limit layer for the upload route.
pub fn upload_body_limit(max_file_size: u64) -> DefaultBodyLimit {
    let max = usize::try_from(max_file_size).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD))
}

fn country(headers: &HeaderMap) -> Option<String> {
    headers
        .get(COUNTRY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn outcome_response(outcome: SubmitOutcome) -> (StatusCode, Json<FileRecord>) {
    let status = if outcome.is_new {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(outcome.file))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Files",
    operation_id = "submitFile",
    summary = "Submit a sample",
    description = "Uploads a file in the `file` multipart field and queues it for scanning. \
        Identical content is stored once: a repeat submission only appends to the file's \
        submission history. Only the first submitter is credited.",
    params(UploadQuery),
    request_body(content_type = "multipart/form-data", description = "Sample upload"),
    responses(
        (status = 201, description = "New file stored and queued", body = FileRecord),
        (status = 200, description = "Known file, submission recorded and requeued", body = FileRecord),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 500, description = "Storage or queue failure (DEPENDENCY_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers, query, multipart), fields(username = %auth_user.username))]
pub async fn submit_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UploadQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let source = match query.source.as_deref() {
        Some(raw) => raw
            .parse::<SubmissionSource>()
            .map_err(AppError::Validation)?,
        None => SubmissionSource::Web,
    };
    let limit = state.content.max_file_size();

    let mut upload: Option<(Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from_multipart(e, limit))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().map(str::to_string);
            let data = read_field(field, limit).await?;
            upload = Some((file_name, data));
        }
    }

    let (file_name, data) =
        upload.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    let meta = UploadMeta {
        filename: file_name.unwrap_or_default(),
        source,
        country: country(&headers),
    };
    let outcome = state
        .submissions
        .submit(&auth_user.username, &data, meta)
        .await?;

    Ok(outcome_response(outcome))
}

async fn read_field(
    mut field: axum::extract::multipart::Field<'_>,
    limit: u64,
) -> Result<Vec<u8>, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::from_multipart(e, limit))?
    {
        if (data.len() + chunk.len()) as u64 > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

#[utoipa::path(
    delete,
    path = "/",
    tag = "Files",
    operation_id = "purgeFiles",
    summary = "Delete every file record",
    description = "Schedules removal of all file records. Stored samples are kept and can be \
        re-ingested.",
    responses(
        (status = 202, description = "Purge scheduled", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(username = %auth_user.username))]
pub async fn purge_files(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_admin()?;

    let content = state.content.clone();
    state.tasks.submit("purge_files", async move {
        content.purge().await?;
        Ok(())
    });
    info!("File purge scheduled");

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new("Purge scheduled")),
    ))
}

#[utoipa::path(
    get,
    path = "/{sha256}",
    tag = "Files",
    operation_id = "getFile",
    summary = "Get a file record",
    params(("sha256" = String, Path, description = "SHA-256 of the content, hex")),
    responses(
        (status = 200, description = "File record", body = FileRecord),
        (status = 400, description = "Malformed hash (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_file(
    State(state): State<AppState>,
    Path(sha256): Path<String>,
) -> Result<Json<FileRecord>, AppError> {
    let sha256 = parse_sha256(&sha256)?;
    Ok(Json(state.content.get(&sha256).await?))
}

#[utoipa::path(
    post,
    path = "/{sha256}/actions",
    tag = "Files",
    operation_id = "fileAction",
    summary = "Rescan, like or unlike a file",
    description = "`rescan` queues a new scan whatever the current status. `like` and `unlike` \
        are idempotent; `changed` is false when the action was already in effect.",
    params(("sha256" = String, Path, description = "SHA-256 of the content, hex")),
    request_body = FileAction,
    responses(
        (status = 200, description = "Action applied", body = FileActionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Queue failure (DEPENDENCY_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(username = %auth_user.username))]
pub async fn file_action(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(sha256): Path<String>,
    AppJson(action): AppJson<FileAction>,
) -> Result<Json<FileActionResponse>, AppError> {
    let hash = parse_sha256(&sha256)?;

    let (action, changed) = match action {
        FileAction::Rescan => {
            state.submissions.rescan(&hash).await?;
            ("rescan", true)
        }
        FileAction::Like => ("like", state.social.like(&auth_user.username, &hash).await?),
        FileAction::Unlike => (
            "unlike",
            state.social.unlike(&auth_user.username, &hash).await?,
        ),
    };

    Ok(Json(FileActionResponse {
        sha256: hash.to_hex(),
        action,
        changed,
    }))
}

#[utoipa::path(
    post,
    path = "/{sha256}/ingest",
    tag = "Files",
    operation_id = "ingestStoredFile",
    summary = "Register a sample already in object storage",
    description = "Creates or requeues the record for bytes pushed directly to the samples \
        bucket under their hash.",
    params(("sha256" = String, Path, description = "SHA-256 of the content, hex")),
    responses(
        (status = 201, description = "Record created and queued", body = FileRecord),
        (status = 200, description = "Existing record requeued", body = FileRecord),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "No stored object for this hash (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers), fields(username = %auth_user.username))]
pub async fn ingest_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(sha256): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_admin()?;
    let hash = parse_sha256(&sha256)?;

    let outcome = state
        .submissions
        .ingest_stored(hash, country(&headers))
        .await?;
    Ok(outcome_response(outcome))
}

#[utoipa::path(
    get,
    path = "/{sha256}/download",
    tag = "Files",
    operation_id = "downloadFile",
    summary = "Download a sample",
    description = "Returns the sample inside a ZIP archive encrypted with the password `infected`.",
    params(("sha256" = String, Path, description = "SHA-256 of the content, hex")),
    responses(
        (status = 200, description = "Encrypted ZIP archive (application/zip)"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "File or stored sample not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(username = %auth_user.username))]
pub async fn download_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(sha256): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let hash = parse_sha256(&sha256)?;
    let archive = state.content.download(&hash).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.zip\"", hash.to_hex()),
            ),
        ],
        archive,
    ))
}
