use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use civisure_auth::AdminUser;
use civisure_common::{AppError, ConsultationStatus, UserRole};

use super::{created, done, ok, status_filter, ApiResult, CreatedResult, IdPath, JsonBody, QueryParams};
use crate::models::{
    Analytics, AnalyticsQuery, ConsultationListQuery, ConsultationView, CreateLawyerRequest,
    CreatedLawyer, Dashboard, RoleUpdateRequest, StatusUpdateRequest, UserListQuery, UserPage,
};
use crate::state::AppState;

pub async fn dashboard(State(state): State<AppState>, AdminUser(_): AdminUser) -> ApiResult<Dashboard> {
    Ok(ok(state.analytics.dashboard().await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Query(query), _): QueryParams<UserListQuery>,
) -> ApiResult<UserPage> {
    Ok(ok(state.identity.list_users(query.pagination()).await?))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(request), _): JsonBody<RoleUpdateRequest>,
) -> ApiResult<()> {
    let role: UserRole = request.role.trim().parse()?;
    state.identity.update_role(&admin, id, role).await?;
    Ok(done("User role updated"))
}

pub async fn analytics(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Query(query), _): QueryParams<AnalyticsQuery>,
) -> ApiResult<Analytics> {
    Ok(ok(state.analytics.analytics(query.period).await?))
}

pub async fn create_lawyer(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Json(request), _): JsonBody<CreateLawyerRequest>,
) -> CreatedResult<CreatedLawyer> {
    if let Err(errors) = request.validate() {
        return Err(AppError::Validation(validation_message(&errors)));
    }

    let lawyer_id = state.directory.create_lawyer(request).await?;
    Ok(created(CreatedLawyer { lawyer_id }, "Lawyer added successfully"))
}

pub async fn list_consultations(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Query(query), _): QueryParams<ConsultationListQuery>,
) -> ApiResult<Vec<ConsultationView>> {
    let status = status_filter::<ConsultationStatus>(query.status.as_deref())?;
    Ok(ok(state.directory.list_consultations(status, query.pagination()).await?))
}

pub async fn update_consultation_status(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(request), _): JsonBody<StatusUpdateRequest>,
) -> ApiResult<()> {
    let status: ConsultationStatus = request.status.trim().parse()?;
    state.directory.update_consultation_status(id, status).await?;
    Ok(done("Consultation status updated"))
}

/// First field message from a validator failure, for a field-agnostic 400.
fn validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid lawyer details".to_string())
}
