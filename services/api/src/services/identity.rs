use std::sync::Arc;

use tokio::sync::OnceCell;
use validator::Validate;

use civisure_auth::{Identity, PasswordService};
use civisure_common::{AppError, Pagination, UserRole};
use civisure_database::{DbPool, User, UserSummary};

use crate::models::{LoginRequest, RegisterRequest, UserInfo, UserPage};
use crate::services::session::SessionStore;

#[derive(Clone)]
pub struct IdentityService {
    db: DbPool,
    passwords: PasswordService,
    sessions: SessionStore,
    // Compared against when the email is unknown so both paths pay for a bcrypt check.
    decoy_hash: Arc<OnceCell<String>>,
}

/// Outcome of a successful login: the public projection plus the session cookie value.
pub struct LoginOutcome {
    pub user: UserInfo,
    pub session_token: String,
}

impl IdentityService {
    pub fn new(db: DbPool, passwords: PasswordService, sessions: SessionStore) -> Self {
        Self {
            db,
            passwords,
            sessions,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    // Hashing is CPU-bound; keep it off the async workers.
    async fn hash(&self, password: String) -> Result<String, AppError> {
        let passwords = self.passwords;
        tokio::task::spawn_blocking(move || passwords.hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool, AppError> {
        let passwords = self.passwords;
        tokio::task::spawn_blocking(move || passwords.verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password check task failed: {}", e)))?
    }

    async fn decoy_hash(&self) -> Result<String, AppError> {
        self.decoy_hash
            .get_or_try_init(|| self.hash(civisure_auth::generate_session_token()))
            .await
            .cloned()
    }

    pub async fn register(&self, mut request: RegisterRequest) -> Result<i64, AppError> {
        request.email = request.email.trim().to_lowercase();
        let email = request.email.clone();
        let full_name = request.full_name.trim().to_string();
        if email.is_empty() || request.password.is_empty() || full_name.is_empty() {
            return Err(AppError::Validation(
                "Email, password, and full name are required".to_string(),
            ));
        }
        if request.validate().is_err() {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let hashed = self.hash(request.password).await?;
        let phone = request
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let user_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, password, full_name, phone, role)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&email)
        .bind(hashed)
        .bind(&full_name)
        .bind(phone)
        .bind(UserRole::User)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match AppError::from(e) {
            err if err.is_unique_violation() => {
                AppError::Conflict("Email already registered".to_string())
            }
            err => err,
        })?;

        tracing::info!("User registered: {} ({})", email, user_id);
        Ok(user_id)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, AppError> {
        let email = request.email.trim().to_lowercase();
        if email.is_empty() || request.password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let invalid = || AppError::Authentication("Invalid credentials".to_string());

        let user = match sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.db)
            .await?
        {
            Some(user) => user,
            None => {
                let decoy = self.decoy_hash().await?;
                let _ = self.verify(request.password, decoy).await;
                return Err(invalid());
            }
        };

        let matches = self
            .verify(request.password, user.password.clone())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Stored password hash for user {} is unreadable: {}", user.id, e);
                false
            });
        if !matches {
            return Err(invalid());
        }

        sqlx::query("UPDATE users SET last_login = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        let session_token = self.sessions.create(user.id).await?;

        tracing::info!("User logged in: {} ({})", user.email, user.id);
        Ok(LoginOutcome {
            user: UserInfo {
                id: user.id,
                email: user.email,
                full_name: user.full_name,
                role: user.role,
            },
            session_token,
        })
    }

    pub async fn logout(&self, session_key: Option<&str>) -> Result<(), AppError> {
        if let Some(key) = session_key {
            self.sessions.destroy(key).await?;
        }
        Ok(())
    }

    pub async fn list_users(&self, page: Pagination) -> Result<UserPage, AppError> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, email, full_name, phone, role, created_at, last_login
            FROM users
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;

        Ok(UserPage { users, total })
    }

    pub async fn update_role(
        &self,
        caller: &Identity,
        user_id: i64,
        role: UserRole,
    ) -> Result<(), AppError> {
        if caller.user_id == user_id {
            return Err(AppError::Validation("Cannot change your own role".to_string()));
        }

        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!("User {} role set to {} by {}", user_id, role, caller.email);
        Ok(())
    }
}

impl From<Identity> for UserInfo {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.user_id,
            email: identity.email,
            full_name: identity.full_name,
            role: identity.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civisure_common::{AuthConfig, DatabaseConfig};

    async fn service() -> IdentityService {
        let db = civisure_database::create_pool(&DatabaseConfig {
            path: ":memory:".to_string(),
            max_connections: 1,
        })
        .await
        .unwrap();
        civisure_database::run_migrations(&db).await.unwrap();
        let config = AuthConfig::default();
        let sessions = SessionStore::new(db.clone(), &config);
        IdentityService::new(db, PasswordService::new(4), sessions)
    }

    #[tokio::test]
    async fn unknown_email_still_runs_a_password_check() {
        let identity = service().await;
        assert!(identity.decoy_hash.get().is_none());

        let result = identity
            .login(LoginRequest {
                email: "ghost@example.com".to_string(),
                password: "whatever".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Authentication(_))));
        let decoy = identity.decoy_hash.get().expect("decoy hash computed");
        assert!(decoy.starts_with("$2"));
    }

    #[tokio::test]
    async fn padded_email_is_trimmed_before_validation() {
        let identity = service().await;

        let user_id = identity
            .register(RegisterRequest {
                email: "  Spaced@Example.com ".to_string(),
                password: "hunter22".to_string(),
                full_name: "Spaced Out".to_string(),
                phone: None,
            })
            .await
            .unwrap();

        let stored: String = sqlx::query_scalar("SELECT email FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&identity.db)
            .await
            .unwrap();
        assert_eq!(stored, "spaced@example.com");
    }
}
