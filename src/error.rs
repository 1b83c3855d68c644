use std::time::Duration;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::participant::ParticipantId};

/// Failures absorbed by the synchronization orchestrator.
///
/// None of these reach the presentation layer; they are logged and folded into the
/// `has_error` / `live` flags of the view model.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The participant source failed while refreshing.
    #[error("failed to fetch standings")]
    FetchFailure(#[source] StorageError),
    /// The refresh did not complete within the configured limit.
    #[error("standings fetch timed out after {limit:?}")]
    FetchTimeout {
        /// Configured fetch timeout.
        limit: Duration,
    },
    /// The push feed could not be established.
    #[error("change feed unavailable")]
    FeedUnavailable(#[source] StorageError),
    /// A fetched window violated the ordering invariant and had to be repaired.
    #[error("fetched window out of order ({duplicates} duplicate identities)")]
    InvariantViolation {
        /// Duplicate identities dropped while repairing the window.
        duplicates: usize,
    },
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Build the error returned when an action targets someone other than the tracked participant.
    pub fn untracked(id: &ParticipantId) -> Self {
        ServiceError::NotFound(format!("participant `{id}` is not tracked"))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
