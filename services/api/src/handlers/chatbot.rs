use axum::{
    extract::{Query, State},
    response::Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use civisure_auth::CurrentUser;

use super::{done, ok, ApiResult, JsonBody, QueryParams};
use crate::models::{AssistantReply, ChatMessageRequest, ConversationView};
use crate::services::assistant::SUGGESTIONS;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    WithRejection(Json(request), _): JsonBody<ChatMessageRequest>,
) -> ApiResult<AssistantReply> {
    Ok(ok(state.assistant.send_message(&caller, request).await?))
}

pub async fn history(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    WithRejection(Query(query), _): QueryParams<HistoryQuery>,
) -> ApiResult<Vec<ConversationView>> {
    Ok(ok(state.assistant.history(&caller, query.limit).await?))
}

pub async fn clear_history(State(state): State<AppState>, CurrentUser(caller): CurrentUser) -> ApiResult<()> {
    state.assistant.clear(&caller).await?;
    Ok(done("Chat history cleared"))
}

pub async fn suggestions() -> ApiResult<Vec<&'static str>> {
    Ok(ok(SUGGESTIONS.to_vec()))
}
