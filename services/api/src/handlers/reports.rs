use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Json},
};
use axum_extra::extract::WithRejection;

use civisure_auth::{AdminUser, CurrentUser};
use civisure_common::{AppError, ReportStatus};

use super::{created, done, ok, status_filter, ApiResult, CreatedResult, IdPath, JsonBody, QueryParams};
use crate::export::{CSV_CONTENT_TYPE, CSV_DISPOSITION};
use crate::models::{
    CreatedReport, CrimeReportView, ExportQuery, MapFeed, MapQuery, ReportFilter, ReportForm,
    ReportListQuery, ReportPage, ReportStats, StatusUpdateRequest,
};
use crate::state::AppState;
use crate::storage::EvidenceUpload;

const EVIDENCE_FIELD: &str = "evidence";
const DEFAULT_MAP_DAYS: i64 = 30;

pub async fn submit_report(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    WithRejection(mut multipart, _): WithRejection<Multipart, AppError>,
) -> CreatedResult<CreatedReport> {
    let mut form = ReportForm::default();
    let mut evidence = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == EVIDENCE_FIELD {
            let original_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            if original_name.is_empty() && bytes.is_empty() {
                continue;
            }
            evidence.push(EvidenceUpload { original_name, bytes });
        } else {
            form.set(&name, field.text().await?);
        }
    }

    let report = form.into_report()?;
    let report_id = state.reporting.submit(&caller, report, evidence).await?;

    Ok(created(CreatedReport { report_id }, "Crime report submitted successfully"))
}

pub async fn list_reports(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Query(query), _): QueryParams<ReportListQuery>,
) -> ApiResult<ReportPage> {
    let filter = ReportFilter {
        status: status_filter(query.status.as_deref())?,
        category: query.category.clone().filter(|c| !c.trim().is_empty()),
        ..ReportFilter::default()
    };

    Ok(ok(state.reporting.list(&filter, query.pagination()).await?))
}

pub async fn map_reports(
    State(state): State<AppState>,
    WithRejection(Query(query), _): QueryParams<MapQuery>,
) -> ApiResult<MapFeed> {
    let category = query.category.filter(|c| !c.trim().is_empty());
    let days = query.days.unwrap_or(DEFAULT_MAP_DAYS);

    let reports = state.reporting.map_feed(category, days).await?;
    Ok(ok(MapFeed { reports }))
}

pub async fn report_stats(State(state): State<AppState>, AdminUser(_): AdminUser) -> ApiResult<ReportStats> {
    Ok(ok(state.reporting.stats().await?))
}

pub async fn get_report(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<CrimeReportView> {
    Ok(ok(state.reporting.get(id).await?))
}

pub async fn update_report_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(request), _): JsonBody<StatusUpdateRequest>,
) -> ApiResult<()> {
    let status: ReportStatus = request.status.trim().parse()?;
    state.reporting.update_status(id, status).await?;

    tracing::debug!("Report {} status changed by {}", id, admin.email);
    Ok(done("Report status updated"))
}

/// CSV download of reports matching the filters. Shared by the reports and admin route groups.
pub async fn export_reports(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Query(query), _): QueryParams<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = query.into_filter()?;
    let csv = state.reporting.export_csv(&filter).await?;

    Ok((
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, CSV_DISPOSITION),
        ],
        csv,
    ))
}
