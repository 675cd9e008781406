use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_extra::extract::WithRejection;

use civisure_auth::{AdminUser, CurrentUser};
use civisure_common::{ApiResponse, SosStatus};

use super::{created, ok, status_filter, ApiResult, CreatedResult, IdPath, JsonBody, QueryParams};
use crate::broadcast::AlertStatusPayload;
use crate::models::{AlertListQuery, AlertView, CreatedAlert, RaiseAlertRequest, StatusUpdateRequest};
use crate::state::AppState;

pub async fn raise_alert(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    WithRejection(Json(request), _): JsonBody<RaiseAlertRequest>,
) -> CreatedResult<CreatedAlert> {
    let alert_id = state.emergency.raise(&caller, request).await?;
    Ok(created(CreatedAlert { alert_id }, "SOS alert sent successfully"))
}

pub async fn active_alerts(State(state): State<AppState>, AdminUser(_): AdminUser) -> ApiResult<Vec<AlertView>> {
    Ok(ok(state.emergency.list_active().await?))
}

pub async fn list_alerts(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Query(query), _): QueryParams<AlertListQuery>,
) -> ApiResult<Vec<AlertView>> {
    let status = status_filter::<SosStatus>(query.status.as_deref())?;
    Ok(ok(state.emergency.list(status, query.pagination()).await?))
}

pub async fn get_alert(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<AlertView> {
    Ok(ok(state.emergency.get(id).await?))
}

pub async fn update_alert_status(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(request), _): JsonBody<StatusUpdateRequest>,
) -> ApiResult<AlertStatusPayload> {
    let status: SosStatus = request.status.trim().parse()?;
    let change = state.emergency.update_status(id, status).await?;

    Ok(Json(ApiResponse::success(change).with_message("SOS alert status updated")))
}

pub async fn my_alerts(State(state): State<AppState>, CurrentUser(caller): CurrentUser) -> ApiResult<Vec<AlertView>> {
    Ok(ok(state.emergency.history(&caller).await?))
}
