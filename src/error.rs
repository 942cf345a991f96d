use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{auth::AuthError, store::StoreError, validation::ValidationErrors};

/// Body of every failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{0}")]
    BadRequest(String),

    /// A mailed verification or reset token that is unknown or expired.
    #[error("{0}")]
    InvalidToken(&'static str),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("The referenced record does not exist")]
    InvalidReference,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => AppError::Conflict(message),
            StoreError::InvalidReference => AppError::InvalidReference,
            StoreError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
        match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed",
                "Please check your input data".into(),
                serde_json::to_value(&errors.0).ok(),
            ),
            AppError::MalformedPayload(reason) => {
                (StatusCode::BAD_REQUEST, "Malformed payload", reason.clone(), None)
            }
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, "Bad request", message.clone(), None),
            AppError::InvalidToken(message) => (StatusCode::BAD_REQUEST, "Invalid token", message.to_string(), None),
            AppError::Auth(err) => (StatusCode::UNAUTHORIZED, err.title(), err.to_string(), None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found", self.to_string(), None),
            AppError::Conflict(message) => (StatusCode::CONFLICT, "Duplicate entry", message.clone(), None),
            AppError::InvalidReference => (StatusCode::BAD_REQUEST, "Invalid reference", self.to_string(), None),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error",
                "Internal server error".into(),
                cfg!(debug_assertions).then(|| serde_json::Value::String(format!("{err:#}"))),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(err) => tracing::error!("❌ Unhandled error: {:#}", err),
            AppError::Validation(errors) => {
                tracing::warn!("⚠️ Validation failed on {}", errors.fields().collect::<Vec<_>>().join(", "))
            }
            _ => {}
        }

        let (status, error, message, details) = self.parts();
        let body = ErrorBody { error: error.to_string(), message, details };

        (status, Json(body)).into_response()
    }
}
