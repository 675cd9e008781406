use axum::{extract::FromRequestParts, http::request::Parts};
use civisure_common::{AppError, UserRole};
use serde::{Deserialize, Serialize};

/// The caller behind a valid session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Per-request authentication state, inserted into request extensions by the
/// session layer before any handler runs.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub identity: Option<Identity>,
    /// Storage key of the presented session, when the cookie verified.
    pub session_key: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(identity: Identity, session_key: String) -> Self {
        Self {
            identity: Some(identity),
            session_key: Some(session_key),
        }
    }
}

fn auth_context(parts: &Parts) -> AuthContext {
    parts
        .extensions
        .get::<AuthContext>()
        .cloned()
        .unwrap_or_default()
}

/// Requires a valid session; 401 otherwise.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

/// Requires a valid session with the admin role; 403 otherwise, including when unauthenticated.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

/// Annotates the request with the caller when there is one; never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        auth_context(parts)
            .identity
            .map(CurrentUser)
            .ok_or_else(|| AppError::Authentication("Authentication required".to_string()))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match auth_context(parts).identity {
            Some(identity) if identity.is_admin() => Ok(AdminUser(identity)),
            _ => Err(AppError::Authorization("Admin access required".to_string())),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(auth_context(parts).identity))
    }
}
