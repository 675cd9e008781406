use std::sync::Arc;
use std::time::Duration;

use civisure_auth::PasswordService;
use civisure_common::{AppConfig, AppError};
use civisure_database::DbPool;

use crate::broadcast::BroadcastHub;
use crate::completion::{AnthropicClient, CompletionClient};
use crate::rate_limit::RateLimiter;
use crate::services::{
    AnalyticsService, AssistantService, DirectoryService, EmergencyService, IdentityService,
    ReportingService, SessionStore,
};
use crate::storage::EvidenceStorage;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub sessions: SessionStore,
    pub identity: IdentityService,
    pub reporting: ReportingService,
    pub emergency: EmergencyService,
    pub directory: DirectoryService,
    pub assistant: AssistantService,
    pub analytics: AnalyticsService,
    pub hub: BroadcastHub,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wire every service against `db`. The assistant talks to Anthropic when a key is configured.
    pub async fn new(config: AppConfig, db: DbPool) -> Result<Self, AppError> {
        let completion = match config.assistant.api_key.clone() {
            Some(key) if config.assistant.is_configured() => {
                Some(Arc::new(AnthropicClient::new(&config.assistant, key)?) as Arc<dyn CompletionClient>)
            }
            _ => {
                tracing::warn!("ANTHROPIC_API_KEY not set; legal assistant disabled");
                None
            }
        };

        Self::with_completion_client(config, db, completion).await
    }

    pub async fn with_completion_client(
        config: AppConfig,
        db: DbPool,
        completion: Option<Arc<dyn CompletionClient>>,
    ) -> Result<Self, AppError> {
        let storage = EvidenceStorage::new(config.upload.clone()).await?;
        let hub = BroadcastHub::default();
        let sessions = SessionStore::new(db.clone(), &config.auth);
        let passwords = PasswordService::new(config.auth.bcrypt_cost);

        Ok(Self {
            identity: IdentityService::new(db.clone(), passwords, sessions.clone()),
            reporting: ReportingService::new(db.clone(), storage),
            emergency: EmergencyService::new(db.clone(), Arc::new(hub.clone())),
            directory: DirectoryService::new(db.clone()),
            assistant: AssistantService::new(db.clone(), completion, &config.assistant),
            analytics: AnalyticsService::new(db.clone()),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            sessions,
            hub,
            db,
            config: Arc::new(config),
        })
    }

    /// Hourly housekeeping: expired sessions and idle rate-limit entries.
    pub fn spawn_maintenance(&self) -> tokio::task::JoinHandle<()> {
        let sessions = self.sessions.clone();
        let limiter = self.rate_limiter.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = sessions.purge_expired().await {
                    tracing::warn!("Session purge failed: {}", e);
                }
                limiter.prune();
                tracing::debug!("Rate limiter tracking {} clients", limiter.tracked_clients());
            }
        })
    }
}
