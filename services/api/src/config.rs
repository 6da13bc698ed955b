//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use learnsphere_core::pipeline::DEFAULT_FALLBACK_CHAIN;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
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
    /// Path of the SQLite database file, created at startup if absent.
    pub database_path: PathBuf,
    pub log_level: Level,
    /// Credential for the upstream model API. Its absence is logged, not
    /// fatal: the server still starts and serves the mock payload.
    pub genai_api_key: Option<String>,
    /// Optional OpenAI-compatible base URL for the model API.
    pub genai_api_base: Option<String>,
    /// The ordered fallback chain of model identifiers.
    pub genai_models: Vec<String>,
    /// Interpreter used by the code-execution endpoint.
    pub python_bin: String,
    /// Wall-clock limit for one code execution.
    pub run_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure
    /// tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("learnsphere.db"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let genai_api_key = std::env::var("GENAI_API_KEY").ok();
        let genai_api_base = std::env::var("GENAI_API_BASE").ok();

        let genai_models = match std::env::var("GENAI_MODELS") {
            Ok(raw) => {
                let models: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if models.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "GENAI_MODELS".to_string(),
                        "must name at least one model".to_string(),
                    ));
                }
                models
            }
            Err(_) => DEFAULT_FALLBACK_CHAIN
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let python_bin = std::env::var("PYTHON_BIN").unwrap_or_else(|_| "python3".to_string());

        let run_timeout_secs = match std::env::var("RUN_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("RUN_TIMEOUT_SECS".to_string(), e.to_string())
            })?,
            Err(_) => 10,
        };

        Ok(Self {
            bind_address,
            database_path,
            log_level,
            genai_api_key,
            genai_api_base,
            genai_models,
            python_bin,
            run_timeout: Duration::from_secs(run_timeout_secs),
        })
    }
}
