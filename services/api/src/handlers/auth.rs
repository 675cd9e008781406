use axum::{extract::State, response::Json, Extension};
use axum_extra::extract::{CookieJar, WithRejection};

use civisure_auth::{removal_cookie, session_cookie, AuthContext, MaybeUser};
use civisure_common::{ApiResponse, AppError};

use super::{created, done, ok, ApiResult, CreatedResult, JsonBody};
use crate::models::{CreatedUser, LoginRequest, LoginResponse, RegisterRequest, SessionStatus, UserInfo};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(request), _): JsonBody<RegisterRequest>,
) -> CreatedResult<CreatedUser> {
    let user_id = state.identity.register(request).await?;
    Ok(created(CreatedUser { user_id }, "Registration successful"))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(request), _): JsonBody<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), AppError> {
    let outcome = state.identity.login(request).await?;

    let auth = &state.config.auth;
    let cookie = session_cookie(
        &auth.cookie_name,
        outcome.session_token,
        auth.session_ttl_hours,
        state.config.environment.is_production(),
    );

    Ok((
        jar.add(cookie),
        Json(ApiResponse::success(LoginResponse { user: outcome.user }).with_message("Login successful")),
    ))
}

/// Ends the presented session, if any. Always clears the cookie.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    context: Option<Extension<AuthContext>>,
) -> Result<(CookieJar, Json<ApiResponse<()>>), AppError> {
    let session_key = context.and_then(|Extension(context)| context.session_key);
    state.identity.logout(session_key.as_deref()).await?;

    Ok((
        jar.remove(removal_cookie(&state.config.auth.cookie_name)),
        done("Logout successful"),
    ))
}

pub async fn check(MaybeUser(identity): MaybeUser) -> ApiResult<SessionStatus> {
    Ok(ok(SessionStatus {
        authenticated: identity.is_some(),
        user: identity.map(UserInfo::from),
    }))
}
