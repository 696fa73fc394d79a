//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `DUNNING` prefix and
//! nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use dunning_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod dunning;
mod error;
mod gateway;
mod notifications;
mod redis;
mod scheduler;
mod server;

pub use database::DatabaseConfig;
pub use dunning::DunningConfig;
pub use error::{ConfigError, ValidationError};
pub use gateway::GatewayConfig;
pub use notifications::NotificationConfig;
pub use redis::RedisConfig;
pub use scheduler::SchedulerSettings;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration.
///
/// Every section has defaults; `database` and `redis` are optional and
/// select in-memory adapters when absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL persistence
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Redis campaign leases
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub dunning: DunningConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `DUNNING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `DUNNING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `DUNNING__DATABASE__URL=...` -> `database.url = ...`
    /// - `DUNNING__SCHEDULER__WORKERS=4` -> `scheduler.workers = 4`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("DUNNING")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate(self.scheduler.concurrent_ticks())?;
        }
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        self.gateway.validate(self.is_production())?;
        self.notifications.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "DUNNING__DATABASE__URL",
        "DUNNING__REDIS__URL",
        "DUNNING__SERVER__PORT",
        "DUNNING__SERVER__ENVIRONMENT",
        "DUNNING__SCHEDULER__WORKERS",
        "DUNNING__DUNNING__SETTINGS_PATH",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_empty_environment_uses_in_memory_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert!(config.database.is_none());
        assert!(config.redis.is_none());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scheduler.workers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("DUNNING__DATABASE__URL", "postgresql://test@localhost/dunning");
        env::set_var("DUNNING__REDIS__URL", "redis://localhost:6379");
        env::set_var("DUNNING__SERVER__PORT", "3000");
        env::set_var("DUNNING__SCHEDULER__WORKERS", "4");
        env::set_var("DUNNING__DUNNING__SETTINGS_PATH", "/etc/dunning/settings.yaml");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.database.as_ref().map(|d| d.url.expose_secret().as_str()),
            Some("postgresql://test@localhost/dunning")
        );
        assert_eq!(
            config.redis.as_ref().map(|r| r.lease_key_prefix.as_str()),
            Some("dunning:lease:")
        );
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.scheduler.workers, 4);
        assert!(config.dunning.settings_path.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_webhook_secret() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("DUNNING__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("GATEWAY__WEBHOOK_SECRET"))
        );
    }
}
