use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::schedule::ScheduleError;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl From<ScheduleError> for ApiError {
    fn from(value: ScheduleError) -> Self {
        match value {
            ScheduleError::ClassNotFound(_)
            | ScheduleError::OverrideNotFound(_)
            | ScheduleError::OccurrenceNotFound { .. } => ApiError::NotFound(value.to_string()),
            ScheduleError::SlotNotFound => ApiError::BadRequest(value.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotConfigured => ApiError::Internal("Storage is not configured".into()),
            StorageError::Http(err) => {
                error!("storage HTTP error: {err}");
                ApiError::Internal("Failed to reach storage".into())
            }
            StorageError::Rejected { status, body } => {
                error!(%status, body, "storage rejected upload");
                ApiError::Internal(format!("Upload failed: {status}"))
            }
        }
    }
}
