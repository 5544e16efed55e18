use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

const PORTAL_BASE_URL_DEVELOPMENT: &str = "http://localhost:3111";
const PORTAL_BASE_URL_STAGING: &str = "https://api.newswire.app/staging";
const PORTAL_BASE_URL_PRODUCTION: &str = "https://api.newswire.app";

const WEBSITE_BASE_URL_DEVELOPMENT: &str = "http://localhost:3000";
const WEBSITE_BASE_URL_STAGING: &str = "https://staging.newswire.app";
const WEBSITE_BASE_URL_PRODUCTION: &str = "https://newswire.app";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_env_var(value: &str) -> Option<Self> {
        match value {
            "development" => Some(Environment::Development),
            "staging" => Some(Environment::Staging),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub claude_api_key: Option<String>,
    pub chat_bot_token: Option<String>,

    /// Disables the response cache entirely (every query calls through).
    #[serde(default)]
    pub caching_disabled: bool,

    /// Overrides the per-environment ingestion interval.
    pub ingest_interval_minutes: Option<u64>,

    /// User ids allowed to run administrative mutations.
    #[serde(default = "default_admins")]
    pub admins: Vec<i64>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newswire");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("newswire.db").to_string_lossy().to_string()
}

fn default_admins() -> Vec<i64> {
    vec![1]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            db_path: default_db_path(),
            claude_api_key: None,
            chat_bot_token: None,
            caching_disabled: false,
            ingest_interval_minutes: None,
            admins: default_admins(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        // Process environment variables win over the config file.
        if let Ok(value) = std::env::var("ENVIRONMENT") {
            if let Some(environment) = Environment::from_env_var(&value) {
                config.environment = environment;
            }
        }
        if std::env::var("CACHING").as_deref() == Ok("false") {
            config.caching_disabled = true;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newswire")
            .join("config.toml")
    }

    pub fn portal_base_url(&self) -> &'static str {
        match self.environment {
            Environment::Development => PORTAL_BASE_URL_DEVELOPMENT,
            Environment::Staging => PORTAL_BASE_URL_STAGING,
            Environment::Production => PORTAL_BASE_URL_PRODUCTION,
        }
    }

    pub fn website_base_url(&self) -> &'static str {
        match self.environment {
            Environment::Development => WEBSITE_BASE_URL_DEVELOPMENT,
            Environment::Staging => WEBSITE_BASE_URL_STAGING,
            Environment::Production => WEBSITE_BASE_URL_PRODUCTION,
        }
    }

    /// Wall-clock pause between ingestion cycles.
    ///
    /// Production polls hourly, everything else every six hours, unless
    /// overridden in the config file.
    pub fn ingest_interval(&self) -> Duration {
        if let Some(minutes) = self.ingest_interval_minutes {
            return Duration::from_secs(minutes * 60);
        }

        match self.environment {
            Environment::Production => Duration::from_secs(60 * 60),
            _ => Duration::from_secs(6 * 60 * 60),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }
}
