//! JSON error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use syllabot_core::error::{Error, ErrorKind};

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            body: ErrorResponse {
                error: message.into(),
                kind,
            },
        }
    }
}

/// Collaborator failures are upstream problems; everything else is ours.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::StateNotFound => StatusCode::NOT_FOUND,
        ErrorKind::RetrievalFailure
        | ErrorKind::GenerationFailure
        | ErrorKind::IncompleteGeneration
        | ErrorKind::SummaryFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        Self {
            status,
            body: ErrorResponse {
                error: rejection.body_text(),
                kind: ErrorKind::InvalidRequest,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, kind = %self.body.kind, "{}", self.body.error);
        }
        (self.status, Json(self.body)).into_response()
    }
}
