use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::ApiResponse;

/// Message returned for every 5xx that is not meant for end users.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong!";

static EXPOSE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

/// Toggle whether 5xx responses carry the underlying error text.
/// Only development deployments turn this on.
pub fn expose_error_details(enabled: bool) {
    EXPOSE_ERROR_DETAILS.store(enabled, Ordering::Relaxed);
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error_code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

impl ApiError {
    pub fn new(error_code: String, message: String) -> Self {
        Self {
            error_code,
            message,
            details: None,
            timestamp: Utc::now(),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

// HTTP status code mapping
impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Authentication(_) => 401,
            AppError::Authorization(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::RateLimited(_) => 429,
            AppError::ExternalService(_) => 502,
            AppError::ServiceUnavailable(_) => 503,
            AppError::Database(_) | AppError::Internal(_) => 500,
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Authorization(_) => "AUTHORIZATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The message a client is allowed to see.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::RateLimited(msg)
            | AppError::ExternalService(msg)
            | AppError::ServiceUnavailable(msg) => msg.clone(),
            AppError::Database(_) | AppError::Internal(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// Build the structured error record used in logs.
    pub fn to_api_error(&self) -> ApiError {
        ApiError::new(self.error_code().to_string(), self.public_message())
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, AppError::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let record = self.to_api_error();

        let mut body = ApiResponse::<()>::error(record.message);
        if status.is_server_error() {
            tracing::error!(
                error_code = %record.error_code,
                request_id = %record.request_id,
                "Request failed: {}",
                self
            );
            if EXPOSE_ERROR_DETAILS.load(Ordering::Relaxed) {
                body.error = Some(self.to_string());
            }
        } else {
            tracing::debug!(error_code = %record.error_code, "Request rejected: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

// Extractor rejections become validation errors so every failure shares the envelope.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected JSON body: {}", rejection.body_text());
        AppError::Validation("Invalid request body".to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!("Rejected query string: {}", rejection.body_text());
        AppError::Validation("Invalid query parameters".to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("Rejected path parameter: {}", rejection.body_text());
        AppError::Validation("Invalid path parameter".to_string())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        tracing::debug!("Rejected multipart request: {}", rejection.body_text());
        AppError::Validation("Expected a multipart form".to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        tracing::debug!("Malformed multipart body: {}", err);
        AppError::Validation("Malformed multipart form".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::Validation("x".into()).status_code(), 400);
        assert_eq!(AppError::Authentication("x".into()).status_code(), 401);
        assert_eq!(AppError::Authorization("x".into()).status_code(), 403);
        assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AppError::Conflict("x".into()).status_code(), 409);
        assert_eq!(AppError::ServiceUnavailable("x".into()).status_code(), 503);
        assert_eq!(AppError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn internal_details_are_hidden_from_public_message() {
        let err = AppError::Internal("disk on fire".into());
        assert_eq!(err.public_message(), GENERIC_FAILURE_MESSAGE);

        let err = AppError::NotFound("Report not found".into());
        assert_eq!(err.public_message(), "Report not found");
    }
}
