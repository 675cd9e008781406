use civisure_auth::{
    generate_session_token, hash_session_token, AuthContext, Identity, JwtService, SessionClaims,
};
use civisure_common::{AppError, AuthConfig};
use civisure_database::{purge_expired_sessions, DbPool, SessionRecord};

/// Server-side sessions. The cookie holds a signed token; the table holds its hash.
#[derive(Clone)]
pub struct SessionStore {
    db: DbPool,
    jwt: JwtService,
    ttl_hours: u64,
}

impl SessionStore {
    pub fn new(db: DbPool, config: &AuthConfig) -> Self {
        Self {
            db,
            jwt: JwtService::new(&config.session_secret),
            ttl_hours: config.session_ttl_hours,
        }
    }

    /// Open a session for `user_id` and return the cookie value.
    pub async fn create(&self, user_id: i64) -> Result<String, AppError> {
        let token = generate_session_token();

        sqlx::query(
            "INSERT INTO sessions (id, user_id, expires_at) VALUES (?, ?, datetime('now', ?))",
        )
        .bind(hash_session_token(&token))
        .bind(user_id)
        .bind(format!("+{} hours", self.ttl_hours))
        .execute(&self.db)
        .await?;

        self.jwt.sign(&SessionClaims::new(token, self.ttl_hours))
    }

    /// Resolve a cookie value into the caller's identity. Any failure yields an anonymous context.
    pub async fn resolve(&self, cookie_value: &str) -> AuthContext {
        let claims = match self.jwt.verify(cookie_value) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Ignoring session cookie: {}", e);
                return AuthContext::anonymous();
            }
        };

        let key = hash_session_token(&claims.sid);
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT u.id AS user_id, u.email, u.full_name, u.role
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = ? AND s.expires_at > datetime('now')
            "#,
        )
        .bind(&key)
        .fetch_optional(&self.db)
        .await;

        match record {
            Ok(Some(record)) => AuthContext::authenticated(
                Identity {
                    user_id: record.user_id,
                    email: record.email,
                    full_name: record.full_name,
                    role: record.role,
                },
                key,
            ),
            Ok(None) => AuthContext::anonymous(),
            Err(e) => {
                tracing::warn!("Session lookup failed: {}", e);
                AuthContext::anonymous()
            }
        }
    }

    pub async fn destroy(&self, session_key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_key)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let removed = purge_expired_sessions(&self.db).await?;
        if removed > 0 {
            tracing::info!("Purged {} expired sessions", removed);
        }
        Ok(removed)
    }
}
