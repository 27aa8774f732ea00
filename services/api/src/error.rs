//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use interview_core::InterviewError;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error raised by the interview state machine.
    #[error(transparent)]
    Interview(#[from] InterviewError),

    /// A malformed HTTP request (bad multipart body, missing field).
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from running the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// Status, stable machine-readable code, and whether the client may retry.
    fn classify(&self) -> (StatusCode, &'static str, bool) {
        match self {
            ApiError::Interview(e) => {
                let (status, code) = match e {
                    InterviewError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                    InterviewError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    InterviewError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
                    InterviewError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
                    InterviewError::Transcription(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "TRANSCRIPTION_ERROR")
                    }
                    InterviewError::EmptyTranscript => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_TRANSCRIPT")
                    }
                    InterviewError::Storage(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
                    }
                };
                (status, code, e.is_retryable())
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", false),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", false),
            ApiError::Database(_) | ApiError::Migration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", true)
            }
            ApiError::Config(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", false)
            }
        }
    }

    /// The client-facing message. Server-side details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Interview(InterviewError::Upstream(_)) => {
                "The interviewer is temporarily unavailable. Please try again.".to_string()
            }
            ApiError::Interview(InterviewError::Transcription(_)) => {
                "Speech recognition is temporarily unavailable. Please try again or type your answer."
                    .to_string()
            }
            ApiError::Interview(InterviewError::EmptyTranscript) => {
                "We couldn't hear anything in that recording. Please speak again.".to_string()
            }
            ApiError::Interview(InterviewError::Storage(_))
            | ApiError::Database(_)
            | ApiError::Migration(_) => "A database error occurred".to_string(),
            ApiError::Config(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                "An internal server error occurred".to_string()
            }
            ApiError::Unauthorized => "Authentication required".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, retryable) = self.classify();
        if status.is_server_error() {
            error!("{} ({}): {}", code, status.as_u16(), self);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.public_message(),
                "retryable": retryable,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_interview_errors_map_to_statuses() {
        let cases = [
            (InterviewError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (InterviewError::NotFound, StatusCode::NOT_FOUND),
            (InterviewError::InvalidState("x".into()), StatusCode::CONFLICT),
            (InterviewError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (InterviewError::Transcription("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (InterviewError::EmptyTranscript, StatusCode::UNPROCESSABLE_ENTITY),
            (InterviewError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(status_of(err.into()), expected);
        }
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::BadRequest("no audio".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_retryable_flag_separates_transient_from_invalid() {
        let (_, _, retry) = ApiError::from(InterviewError::Upstream("x".into())).classify();
        assert!(retry);
        let (_, _, retry) = ApiError::from(InterviewError::InvalidState("x".into())).classify();
        assert!(!retry);
        let (_, code, retry) = ApiError::from(InterviewError::EmptyTranscript).classify();
        assert_eq!(code, "EMPTY_TRANSCRIPT");
        assert!(retry);
    }

    #[test]
    fn test_upstream_details_are_not_leaked() {
        let err = ApiError::from(InterviewError::Upstream("api key sk-123 rejected".into()));
        assert!(!err.public_message().contains("sk-123"));
        let err = ApiError::from(InterviewError::Validation("job_role is too short".into()));
        assert!(err.public_message().contains("job_role is too short"));
    }
}
