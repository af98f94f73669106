use serde::Deserialize;
use std::env;
use std::time::Duration;

use config::ConfigError;

use crate::services::achievement_service::ClaimPolicy;
use crate::services::notification_center::DEFAULT_DISMISS_AFTER;
use crate::services::reward::{BonusPrecedence, PerfectBonus};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    /// `None` keeps the achievement bus unbounded
    pub bus_capacity: Option<usize>,
    pub dismiss_after_ms: u64,
    pub perfect_bonus_multiplier: f64,
    pub bonus_precedence: BonusPrecedence,
    pub claim_policy: ClaimPolicy,
    pub seed_catalog: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "finankids".to_string(),
            bus_capacity: None,
            dismiss_after_ms: DEFAULT_DISMISS_AFTER.as_millis() as u64,
            perfect_bonus_multiplier: 1.2,
            bonus_precedence: BonusPrecedence::default(),
            claim_policy: ClaimPolicy::default(),
            seed_catalog: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let config = Self::from_settings(&settings)?;
        tracing::debug!(
            env = %env,
            database = %config.mongo_database,
            bus_capacity = ?config.bus_capacity,
            claim_policy = ?config.claim_policy,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Reads every key from already built settings, falling back to legacy env vars and defaults.
    pub fn from_settings(settings: &config::Config) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or(defaults.mongo_uri);

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.mongo_database);

        let bus_capacity = optional::<usize>(settings, "events.bus_capacity")?;
        if bus_capacity == Some(0) {
            return Err(ConfigError::Message(
                "events.bus_capacity must be at least 1".to_string(),
            ));
        }

        let dismiss_after_ms = optional(settings, "notifications.dismiss_after_ms")?
            .unwrap_or(defaults.dismiss_after_ms);

        let perfect_bonus_multiplier = optional(settings, "lessons.perfect_bonus_multiplier")?
            .unwrap_or(defaults.perfect_bonus_multiplier);
        if !perfect_bonus_multiplier.is_finite() || perfect_bonus_multiplier < 1.0 {
            return Err(ConfigError::Message(format!(
                "lessons.perfect_bonus_multiplier must be >= 1.0, got {}",
                perfect_bonus_multiplier
            )));
        }

        let bonus_precedence = optional(settings, "lessons.bonus_precedence")?
            .unwrap_or(defaults.bonus_precedence);
        let claim_policy =
            optional(settings, "achievements.claim_policy")?.unwrap_or(defaults.claim_policy);
        let seed_catalog =
            optional(settings, "achievements.seed_catalog")?.unwrap_or(defaults.seed_catalog);

        Ok(Config {
            mongo_uri,
            mongo_database,
            bus_capacity,
            dismiss_after_ms,
            perfect_bonus_multiplier,
            bonus_precedence,
            claim_policy,
            seed_catalog,
        })
    }

    pub fn dismiss_after(&self) -> Duration {
        Duration::from_millis(self.dismiss_after_ms)
    }

    pub fn perfect_bonus(&self) -> PerfectBonus {
        PerfectBonus::from_multiplier(self.perfect_bonus_multiplier, self.bonus_precedence)
    }
}

fn optional<'de, T: Deserialize<'de>>(
    settings: &config::Config,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match settings.get::<T>(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}
