use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use civisure_auth::AuthContext;
use civisure_common::AppError;

use crate::state::AppState;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

// Session middleware: resolves the session cookie into an AuthContext for the extractors.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let context = match jar.get(&state.config.auth.cookie_name) {
        Some(cookie) => state.sessions.resolve(cookie.value()).await,
        None => AuthContext::anonymous(),
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

/// Client identity for rate limiting. Forwarded headers (first hop, then X-Real-IP) count only
/// when `trust_proxy` is set; otherwise the socket peer is the client.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let forwarded = if trust_proxy {
        header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(|hop| hop.trim().to_string())
            .filter(|hop| !hop.is_empty())
            .or_else(|| header("x-real-ip").map(str::to_string))
    } else {
        None
    };

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.config.rate_limit.trust_proxy);

    if !state.rate_limiter.check(&key) {
        tracing::warn!("Rate limit exceeded for {}", key);
        return AppError::RateLimited(RATE_LIMIT_MESSAGE.to_string()).into_response();
    }

    next.run(request).await
}
