/// Unified error types for the actor cache service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum CastError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Malformed or out-of-range request parameters
    #[error("{0}")]
    Validation(String),

    /// Unknown actor id, or nothing stored yet
    #[error("{0}")]
    NotFound(String),

    /// Duplicate actor name
    #[error("{0}")]
    AlreadyExists(String),

    /// Failures talking to the external actor directory
    #[error("Directory error: {0}")]
    Directory(String),

    /// Chart rendering or encoding errors
    #[error("Chart error: {0}")]
    Chart(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for CastError {
    fn from(err: image::ImageError) -> Self {
        CastError::Chart(err.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for CastError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            CastError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            CastError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            CastError::AlreadyExists(_) => (
                StatusCode::CONFLICT,
                "AlreadyExists",
                self.to_string(),
            ),
            CastError::Directory(_) => {
                tracing::warn!("{}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    "DirectoryUnavailable",
                    "The actor directory could not be reached".to_string(),
                )
            }
            CastError::Database(_)
            | CastError::Migration(_)
            | CastError::Chart(_)
            | CastError::Internal(_)
            | CastError::Io(_) => {
                // Don't leak details
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type CastResult<T> = Result<T, CastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (CastError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CastError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (CastError::AlreadyExists("dup".into()), StatusCode::CONFLICT),
            (CastError::Directory("down".into()), StatusCode::BAD_GATEWAY),
            (CastError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_user_facing_messages_are_bare() {
        let err = CastError::NotFound("Actor with id 7 is not found".into());
        assert_eq!(err.to_string(), "Actor with id 7 is not found");
    }
}
