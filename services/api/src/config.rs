use civisure_common::{
    AppConfig, AssistantConfig, AuthConfig, DatabaseConfig, Environment, RateLimitConfig,
    ServerConfig, UploadConfig,
};
use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Flat view of every recognised setting. Keys match the lower-cased environment variable names.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_origins: Option<String>,
    pub db_path: Option<String>,
    pub db_max_connections: Option<u32>,
    pub session_secret: Option<String>,
    pub session_ttl_hours: Option<u64>,
    pub bcrypt_rounds: Option<u32>,
    pub rate_limit_window_secs: Option<u64>,
    pub rate_limit_max: Option<u32>,
    pub trust_proxy: Option<bool>,
    pub upload_dir: Option<String>,
    pub upload_max_file_mb: Option<usize>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub anthropic_model: Option<String>,
    pub anthropic_max_tokens: Option<u32>,
    pub assistant_history_window: Option<usize>,
    pub app_env: Option<String>,
    pub rust_log: Option<String>,
}

/// Load configuration from an optional `civisure.toml` and the process environment.
/// Environment variables win over the file; anything unset falls back to defaults.
pub fn load() -> Result<AppConfig, ConfigError> {
    let settings: Settings = Config::builder()
        .add_source(File::with_name("civisure").required(false))
        .add_source(config::Environment::default())
        .build()?
        .try_deserialize()?;

    settings.into_app_config()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Settings {
    pub fn into_app_config(self) -> Result<AppConfig, ConfigError> {
        let server_defaults = ServerConfig::default();
        let database_defaults = DatabaseConfig::default();
        let auth_defaults = AuthConfig::default();
        let rate_defaults = RateLimitConfig::default();
        let upload_defaults = UploadConfig::default();
        let assistant_defaults = AssistantConfig::default();
        let app_defaults = AppConfig::default();

        let environment = self
            .app_env
            .as_deref()
            .map(Environment::parse)
            .unwrap_or(app_defaults.environment);

        let session_secret = non_empty(self.session_secret).unwrap_or(auth_defaults.session_secret);
        if environment.is_production() && session_secret == AuthConfig::default().session_secret {
            return Err(ConfigError::Message(
                "SESSION_SECRET must be set in production".to_string(),
            ));
        }

        let cors_origins = match non_empty(self.cors_origins) {
            Some(origins) => origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => server_defaults.cors_origins,
        };

        Ok(AppConfig {
            server: ServerConfig {
                host: non_empty(self.host).unwrap_or(server_defaults.host),
                port: self.port.unwrap_or(server_defaults.port),
                cors_origins,
            },
            database: DatabaseConfig {
                path: non_empty(self.db_path).unwrap_or(database_defaults.path),
                max_connections: self
                    .db_max_connections
                    .unwrap_or(database_defaults.max_connections),
            },
            auth: AuthConfig {
                session_secret,
                session_ttl_hours: self
                    .session_ttl_hours
                    .unwrap_or(auth_defaults.session_ttl_hours),
                bcrypt_cost: self.bcrypt_rounds.unwrap_or(auth_defaults.bcrypt_cost),
                ..auth_defaults
            },
            rate_limit: RateLimitConfig {
                window_secs: self.rate_limit_window_secs.unwrap_or(rate_defaults.window_secs),
                max_requests: self.rate_limit_max.unwrap_or(rate_defaults.max_requests),
                trust_proxy: self.trust_proxy.unwrap_or(rate_defaults.trust_proxy),
            },
            upload: UploadConfig {
                dir: non_empty(self.upload_dir).unwrap_or(upload_defaults.dir.clone()),
                max_file_size_mb: self
                    .upload_max_file_mb
                    .unwrap_or(upload_defaults.max_file_size_mb),
                ..upload_defaults
            },
            assistant: AssistantConfig {
                api_key: non_empty(self.anthropic_api_key),
                base_url: non_empty(self.anthropic_base_url).unwrap_or(assistant_defaults.base_url),
                model: non_empty(self.anthropic_model).unwrap_or(assistant_defaults.model),
                max_tokens: self.anthropic_max_tokens.unwrap_or(assistant_defaults.max_tokens),
                history_window: self.assistant_history_window,
            },
            environment,
            log_level: non_empty(self.rust_log).unwrap_or(app_defaults.log_level),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let mut builder = Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Settings::default().into_app_config().unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.cookie_name, "civisure.sid");
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert!(!config.rate_limit.trust_proxy);
        assert!(!config.assistant.is_configured());
        assert!(config.environment.is_development());
    }

    #[test]
    fn string_values_are_parsed_into_typed_fields() {
        let config = settings_from(&[
            ("port", "8080"),
            ("cors_origins", "http://a.test, http://b.test"),
            ("bcrypt_rounds", "4"),
            ("assistant_history_window", "6"),
            ("anthropic_api_key", "sk-test"),
            ("trust_proxy", "true"),
        ])
        .into_app_config()
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.server.cors_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.auth.bcrypt_cost, 4);
        assert_eq!(config.assistant.history_window, Some(6));
        assert!(config.rate_limit.trust_proxy);
        assert!(config.assistant.is_configured());
    }

    #[test]
    fn production_requires_a_session_secret() {
        let result = settings_from(&[("app_env", "production")]).into_app_config();
        assert!(result.is_err());

        let config = settings_from(&[("app_env", "production"), ("session_secret", "s3cret")])
            .into_app_config()
            .unwrap();
        assert!(config.environment.is_production());
    }
}
