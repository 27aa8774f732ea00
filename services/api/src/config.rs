//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use interview_core::InterviewSettings;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: String,
    /// Base URL of an OpenAI-compatible provider; `None` uses api.openai.com.
    pub openai_base_url: Option<String>,
    pub chat_model: String,
    pub evaluation_model: String,
    pub sst_model: String,
    pub max_user_turns: usize,
    pub ai_timeout: Duration,
    pub cors_origin: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        // --- Server and Database Settings ---
        let bind_address = parse("BIND_ADDRESS", &var("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url = required("DATABASE_URL")?;

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generation Backend ---
        let openai_api_key = required("OPENAI_API_KEY")?;
        let openai_base_url = lookup("OPENAI_BASE_URL").filter(|v| !v.trim().is_empty());
        let chat_model = var("CHAT_MODEL", "gpt-4o-mini");
        let evaluation_model = var("EVALUATION_MODEL", &chat_model);
        let sst_model = var("SST_MODEL", "whisper-1");

        // --- Interview Behaviour ---
        let max_user_turns: usize = parse("MAX_USER_TURNS", &var("MAX_USER_TURNS", "7"))?;
        if max_user_turns == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_USER_TURNS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let timeout_secs: u64 = parse("AI_TIMEOUT_SECS", &var("AI_TIMEOUT_SECS", "60"))?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "AI_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- HTTP ---
        let cors_origin = var("CORS_ORIGIN", "http://localhost:3000");
        let max_upload_bytes = parse("MAX_UPLOAD_BYTES", &var("MAX_UPLOAD_BYTES", "10485760"))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_base_url,
            chat_model,
            evaluation_model,
            sst_model,
            max_user_turns,
            ai_timeout: Duration::from_secs(timeout_secs),
            cors_origin,
            max_upload_bytes,
        })
    }

    pub fn interview_settings(&self) -> InterviewSettings {
        InterviewSettings {
            max_user_turns: self.max_user_turns,
            ai_timeout: self.ai_timeout,
        }
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
