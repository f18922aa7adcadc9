//! Service-layer error type and the `{ error, detail }` JSON envelope handlers return.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use thiserror::Error;

use crate::services::mailer::MailError;

/// What every handler returns on failure.
pub type ApiError = (StatusCode, Json<Value>);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email delivery failed: {0}")]
    Mail(#[from] MailError),

    #[error("{0}")]
    Delivery(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Database(_) | ServiceError::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Delivery(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = err.status();
        match &err {
            ServiceError::Validation(msg) => error_response(status, "Invalid request", Some(msg.clone())),
            ServiceError::NotFound(msg) => error_response(status, "Not found", Some(msg.clone())),
            ServiceError::Conflict(msg) => error_response(status, "Conflict", Some(msg.clone())),
            ServiceError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                error_response(status, "Database error", Some(e.to_string()))
            }
            ServiceError::Delivery(msg) => error_response(status, "Email delivery failed", Some(msg.clone())),
            ServiceError::Mail(e) => {
                tracing::error!("Mail error: {:?}", e);
                error_response(status, "Email delivery failed", Some(e.to_string()))
            }
        }
    }
}

pub fn error_response(status: StatusCode, error: &str, detail: Option<String>) -> ApiError {
    (
        status,
        Json(serde_json::json!({
            "error": error,
            "detail": detail,
        })),
    )
}

pub fn bad_request(detail: impl Into<String>) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, "Invalid request", Some(detail.into()))
}

/// Malformed bodies, paths and query strings are validation errors like any other.
pub fn json_rejection(rejection: JsonRejection) -> ApiError {
    bad_request(rejection.body_text())
}

pub fn path_rejection(rejection: PathRejection) -> ApiError {
    bad_request(rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> ApiError {
    bad_request(rejection.body_text())
}
