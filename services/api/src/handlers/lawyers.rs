use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_extra::extract::WithRejection;

use civisure_auth::CurrentUser;
use civisure_database::ConsultationRequest;

use super::{created, ok, ApiResult, CreatedResult, IdPath, JsonBody, QueryParams};
use crate::models::{
    ConsultationRequestBody, CreatedConsultation, LawyerPage, LawyerProfile, LawyerRating,
    LawyerSearchQuery, ReviewRequest, SpecializationCount,
};
use crate::state::AppState;

pub async fn search_lawyers(
    State(state): State<AppState>,
    WithRejection(Query(query), _): QueryParams<LawyerSearchQuery>,
) -> ApiResult<LawyerPage> {
    let page = query.pagination();
    Ok(ok(state.directory.search(&query, page).await?))
}

pub async fn specializations(State(state): State<AppState>) -> ApiResult<Vec<SpecializationCount>> {
    Ok(ok(state.directory.specializations().await?))
}

pub async fn get_lawyer(
    State(state): State<AppState>,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<LawyerProfile> {
    Ok(ok(state.directory.get(id).await?))
}

pub async fn submit_review(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(request), _): JsonBody<ReviewRequest>,
) -> CreatedResult<LawyerRating> {
    let rating = state.directory.submit_review(&caller, id, request).await?;
    Ok(created(rating, "Review submitted successfully"))
}

pub async fn request_consultation(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    WithRejection(Path(id), _): IdPath,
    WithRejection(Json(request), _): JsonBody<ConsultationRequestBody>,
) -> CreatedResult<CreatedConsultation> {
    let request_id = state.directory.request_consultation(&caller, id, request).await?;
    Ok(created(
        CreatedConsultation { request_id },
        "Consultation request sent successfully",
    ))
}

pub async fn my_consultations(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Vec<ConsultationRequest>> {
    Ok(ok(state.directory.my_consultations(&caller).await?))
}
