use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pollcast_core::{ValidationError, VoteError};
use pollcast_store::StoreError;
use serde_json::json;
use thiserror::Error;

use crate::config::Backend;

/// Request failure, mapped onto an HTTP status and a stable error code.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The body is not valid JSON.
    #[error("Invalid JSON body.")]
    InvalidBody,

    /// No sender identity could be determined and the policy rejects such votes.
    #[error("Could not determine voter identity.")]
    UnknownIdentity,

    /// No poll with this id.
    #[error("Poll not found.")]
    NotFound,

    /// Option index outside the poll's options.
    #[error("Option index out of range.")]
    OutOfRange,

    /// The identity has already voted on this poll.
    #[error("This identity has already voted for this poll.")]
    DuplicateVote,

    /// The store did not answer in time.
    #[error("store call timed out")]
    Timeout,

    /// Any other storage or runtime fault.
    #[error("{0}")]
    Internal(String),
}

/// Failure to start or run the server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Binding or accepting on the listener failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The database could not be opened.
    #[error("failed to open {backend} store: {source}")]
    Open {
        /// Backend being opened.
        backend: Backend,
        /// Underlying backend error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The backend was not compiled into this build.
    #[error("the {0} backend is not enabled in this build")]
    BackendUnavailable(Backend),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidBody | Self::UnknownIdentity | Self::OutOfRange => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DuplicateVote => StatusCode::CONFLICT,
            Self::Timeout | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code sent as `error`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidBody | Self::UnknownIdentity => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::OutOfRange => "RANGE_ERROR",
            Self::DuplicateVote => "DUPLICATE_VOTE",
            Self::Timeout | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<VoteError> for AppError {
    fn from(e: VoteError) -> Self {
        match e {
            VoteError::OptionOutOfRange { .. } => Self::OutOfRange,
            VoteError::DuplicateVote => Self::DuplicateVote,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(v) => Self::Validation(v),
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::Vote(v) => v.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error.".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(json!({ "error": self.code(), "message": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollcast_core::PollId;

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::from(ValidationError::EmptyQuestion).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(StoreError::NotFound(PollId::generate())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(StoreError::Vote(VoteError::DuplicateVote)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(VoteError::OptionOutOfRange { index: -1 }).code(),
            "RANGE_ERROR"
        );
        assert_eq!(AppError::Timeout.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn backend_faults_are_internal() {
        let err = AppError::from(StoreError::Contention {
            id: PollId::generate(),
            attempts: 8,
        });
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn internal_detail_is_hidden() {
        let response = AppError::Internal("disk on fire at /var/db".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("INTERNAL_ERROR"));
        assert!(!text.contains("disk on fire"));
    }
}
