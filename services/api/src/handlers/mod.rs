pub mod admin;
pub mod auth;
pub mod chatbot;
pub mod lawyers;
pub mod reports;
pub mod sos;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;

use civisure_common::{ApiResponse, AppError};

use crate::state::AppState;

/// JSON body whose rejection renders through the standard error envelope.
pub type JsonBody<T> = WithRejection<Json<T>, AppError>;
pub type QueryParams<T> = WithRejection<Query<T>, AppError>;
pub type IdPath = WithRejection<Path<i64>, AppError>;

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

pub(crate) fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

pub(crate) fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        StatusCode::CREATED,
        Json(ApiResponse::success(data).with_message(message)),
    )
}

pub(crate) fn done(message: &str) -> Json<ApiResponse<()>> {
    Json(ApiResponse::message(message))
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub observers: usize,
}

// Health check
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!("Health check could not reach the database: {}", e);
            "unavailable"
        }
    };

    ok(HealthStatus {
        status: "OK",
        database,
        observers: state.hub.observer_count(),
    })
}

pub async fn handler_404() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Route not found".to_string())),
    )
}

/// Parse an optional status filter; blank means no filter.
pub(crate) fn status_filter<T>(value: Option<&str>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = AppError>,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::parse)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use civisure_common::ReportStatus;

    #[test]
    fn blank_status_filter_is_ignored() {
        assert_eq!(status_filter::<ReportStatus>(None).unwrap(), None);
        assert_eq!(status_filter::<ReportStatus>(Some("  ")).unwrap(), None);
        assert_eq!(
            status_filter::<ReportStatus>(Some("resolved")).unwrap(),
            Some(ReportStatus::Resolved)
        );
        assert_eq!(
            status_filter::<ReportStatus>(Some("closed")).unwrap_err().public_message(),
            "Invalid status"
        );
    }
}
