#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{header, HeaderValue};
use axum_test::multipart::MultipartForm;
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use tempfile::TempDir;

use civisure_api::build_router;
use civisure_api::completion::{CompletionClient, CompletionError, CompletionRequest};
use civisure_api::state::AppState;
use civisure_auth::PasswordService;
use civisure_common::{AppConfig, DatabaseConfig, RateLimitConfig, UploadConfig};
use civisure_database::{create_pool, run_migrations, MigrationRunner};

pub const ADMIN_EMAIL: &str = "admin@civisure.com";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const USER_EMAIL: &str = "user@civisure.com";
pub const USER_PASSWORD: &str = "user123";

#[derive(Debug, Clone)]
pub enum FakeReply {
    Text(String),
    Unauthorized,
    Unreachable,
    Overloaded,
}

/// Completion client that answers from a script and records what it was asked.
pub struct FakeCompletion {
    reply: Mutex<FakeReply>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletion {
    pub fn new(reply: FakeReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: FakeReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(request);
        match self.reply.lock().unwrap().clone() {
            FakeReply::Text(text) => Ok(text),
            FakeReply::Unauthorized => Err(CompletionError::Unauthorized),
            FakeReply::Unreachable => Err(CompletionError::Unreachable("connection refused".into())),
            FakeReply::Overloaded => Err(CompletionError::Upstream {
                status: 529,
                message: "overloaded".into(),
            }),
        }
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub completion: Arc<FakeCompletion>,
    pub uploads: TempDir,
}

pub struct TestOptions {
    pub database_path: Option<String>,
    pub rate_limit_max: u32,
    pub trust_proxy: bool,
    pub assistant_enabled: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            database_path: None,
            rate_limit_max: 10_000,
            trust_proxy: false,
            assistant_enabled: true,
        }
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        let uploads = TempDir::new().expect("Failed to create upload dir");

        let mut config = AppConfig::default();
        config.database = DatabaseConfig {
            path: options.database_path.unwrap_or_else(|| ":memory:".to_string()),
            max_connections: 5,
        };
        config.auth.bcrypt_cost = 4;
        config.rate_limit = RateLimitConfig {
            window_secs: 900,
            max_requests: options.rate_limit_max,
            trust_proxy: options.trust_proxy,
        };
        config.upload = UploadConfig {
            dir: uploads.path().to_string_lossy().to_string(),
            ..UploadConfig::default()
        };

        let pool = create_pool(&config.database).await.expect("Failed to open database");
        run_migrations(&pool).await.expect("Failed to run migrations");
        MigrationRunner::new(pool.clone(), PasswordService::new(4))
            .seed_initial_data()
            .await
            .expect("Failed to seed database");

        let completion = Arc::new(FakeCompletion::new(FakeReply::Text(
            "This is general legal information.".to_string(),
        )));
        let client: Option<Arc<dyn CompletionClient>> = if options.assistant_enabled {
            Some(completion.clone() as Arc<dyn CompletionClient>)
        } else {
            None
        };

        let state = AppState::with_completion_client(config, pool, client)
            .await
            .expect("Failed to build state");
        let server = TestServer::new(build_router(state.clone())).expect("Failed to start server");

        Self {
            server,
            state,
            completion,
            uploads,
        }
    }

    /// Log in and return the `Cookie` header value for the new session.
    pub async fn login(&self, email: &str, password: &str) -> HeaderValue {
        let response = self
            .server
            .post("/api/auth/login")
            .json(&json!({"email": email, "password": password}))
            .await;
        response.assert_status_ok();
        session_cookie(&response)
    }

    pub async fn login_admin(&self) -> HeaderValue {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn login_user(&self) -> HeaderValue {
        self.login(USER_EMAIL, USER_PASSWORD).await
    }

    /// Register a fresh account and log it in.
    pub async fn register_and_login(&self, email: &str) -> HeaderValue {
        self.server
            .post("/api/auth/register")
            .json(&json!({"email": email, "password": "secret-pass", "fullName": "Someone Else"}))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
        self.login(email, "secret-pass").await
    }

    pub async fn submit_report(&self, cookie: &HeaderValue, form: MultipartForm) -> TestResponse {
        self.server
            .post("/api/reports")
            .add_header(header::COOKIE, cookie.clone())
            .multipart(form)
            .await
    }

    pub async fn user_id(&self, email: &str) -> i64 {
        sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.state.db)
            .await
            .expect("user exists")
    }

    /// Serve the same state on a real loopback listener, for clients that need a socket.
    pub async fn listen(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("bound address");
        let app = build_router(self.state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .expect("server error");
        });
        addr
    }

    pub async fn first_lawyer_id(&self) -> i64 {
        sqlx::query_scalar("SELECT id FROM lawyers ORDER BY id LIMIT 1")
            .fetch_one(&self.state.db)
            .await
            .expect("seeded lawyer")
    }
}

/// `name=value` pair from the response's `Set-Cookie`, ready to send back as `Cookie`.
pub fn session_cookie(response: &TestResponse) -> HeaderValue {
    let set_cookie = response.header(header::SET_COOKIE);
    let pair = set_cookie
        .to_str()
        .expect("ascii cookie")
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string();
    HeaderValue::from_str(&pair).expect("valid cookie header")
}

pub fn report_form(anonymous: bool) -> MultipartForm {
    MultipartForm::new()
        .add_text("category", "Theft")
        .add_text("description", "Bicycle taken from the rack outside the library")
        .add_text("locationLat", "12.9716")
        .add_text("locationLng", "77.5946")
        .add_text("locationAddress", "MG Road, Bengaluru")
        .add_text("dateTime", "2024-05-01T21:30")
        .add_text("anonymous", if anonymous { "true" } else { "false" })
}

pub fn data(response: &TestResponse) -> Value {
    response.json::<Value>()["data"].clone()
}

pub fn message(response: &TestResponse) -> String {
    response.json::<Value>()["message"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}
