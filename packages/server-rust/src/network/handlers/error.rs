//! Maps engine errors onto HTTP responses.
//!
//! Every error body has the shape `{"error", "code", "message"}` where `error`
//! is the HTTP reason phrase and `code` the stable engine code.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dispatch_core::{DispatchError, ValidationError};
use serde::Serialize;
use tracing::warn;

/// Error returned by every dispatch handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Body could not be parsed into the request shape.
    #[error("{0}")]
    BadRequest(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Dispatch(DispatchError::Validation(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'a str,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Dispatch(err) => match err {
                DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
                DispatchError::DuplicateWorker { .. }
                | DispatchError::DuplicateTask { .. }
                | DispatchError::TaskNotPending { .. } => StatusCode::CONFLICT,
                DispatchError::WorkerNotFound { .. } | DispatchError::TaskNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                DispatchError::QueueFull { .. } | DispatchError::PoolClosed => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                DispatchError::NoEligibleWorker { .. }
                | DispatchError::WorkerNoLongerAvailable { .. }
                | DispatchError::Timeout => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Dispatch(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("Error"),
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
