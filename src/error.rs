use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::store::{GuardError, StoreError};
use crate::validate::FieldErrors;

/// The only failure text a caller of the relay ever sees.
pub const GENERIC_RELAY_ERROR: &str = "Error making prediction";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("request body is not a JSON object: {0}")]
    InvalidRequest(#[source] serde_json::Error),

    #[error("scoring service at {endpoint} is unreachable: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("scoring service at {endpoint} did not answer within {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("scoring service answered {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("scoring service sent a malformed body: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": GENERIC_RELAY_ERROR })),
        )
            .into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("invalid fields: {0}")]
    Validation(FieldErrors),

    #[error("a submission is already in progress for this session")]
    InFlight,

    #[error("unknown session")]
    UnknownSession,

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<GuardError> for SubmitError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::UnknownSession(_) => SubmitError::UnknownSession,
            GuardError::InFlight(_) => SubmitError::InFlight,
        }
    }
}

impl From<StoreError> for SubmitError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownSession(_) => SubmitError::UnknownSession,
            other => SubmitError::Store(other),
        }
    }
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        match self {
            SubmitError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            SubmitError::InFlight => (
                StatusCode::CONFLICT,
                Json(json!({ "error": "Submission already in progress" })),
            )
                .into_response(),
            SubmitError::UnknownSession => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Unknown session" })),
            )
                .into_response(),
            SubmitError::Relay(err) => err.into_response(),
            SubmitError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": GENERIC_RELAY_ERROR })),
            )
                .into_response(),
        }
    }
}
