use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::services::ServiceError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `PAYLOAD_TOO_LARGE`,
    /// `TOKEN_MISSING`, `TOKEN_INVALID`, `INVALID_CREDENTIALS`, `NOT_CONFIRMED`,
    /// `PERMISSION_DENIED`, `NOT_FOUND`, `CONFLICT`, `WRITE_CONTENTION`,
    /// `DEPENDENCY_FAILURE`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Comment must not be empty")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    PayloadTooLarge { limit: u64 },
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    NotConfirmed,
    PermissionDenied(String),
    NotFound(String),
    Conflict(String),
    /// Concurrent writers kept winning. Safe to retry.
    Contention(String),
    /// Storage, document store, queue or timeout failure. Safe to retry.
    Dependency(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::PayloadTooLarge { limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody {
                    code: "PAYLOAD_TOO_LARGE",
                    message: format!("Payload exceeds the limit of {limit} bytes"),
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "INVALID_CREDENTIALS",
                    message: "Invalid username or password".into(),
                },
            ),
            AppError::NotConfirmed => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "NOT_CONFIRMED",
                    message: "Account email address is not confirmed".into(),
                },
            ),
            AppError::PermissionDenied(msg) => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: msg,
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::Contention(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "WRITE_CONTENTION",
                    message: msg,
                },
            ),
            AppError::Dependency(detail) => {
                tracing::error!("Dependency failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "DEPENDENCY_FAILURE",
                        message: "A backing service failed, try again later".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => AppError::Validation(msg),
            ServiceError::TooLarge { limit, .. } => AppError::PayloadTooLarge { limit },
            ServiceError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            ServiceError::Conflict(msg) => AppError::Conflict(msg),
            ServiceError::Contention(msg) => AppError::Contention(msg),
            ServiceError::InvalidCredentials => AppError::InvalidCredentials,
            ServiceError::InvalidToken => AppError::TokenInvalid,
            ServiceError::NotConfirmed => AppError::NotConfirmed,
            ServiceError::Unauthorized(msg) => AppError::PermissionDenied(msg),
            ServiceError::Internal(detail) => AppError::Internal(detail),
            transient => AppError::Dependency(transient.to_string()),
        }
    }
}

impl AppError {
    /// Convert a multipart stream error for an upload limited to `limit` bytes.
    pub fn from_multipart(err: MultipartError, limit: u64) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge { limit }
        } else {
            AppError::Validation(err.body_text())
        }
    }
}
