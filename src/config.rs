//! Configuration loading
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML file: explicit path, else `CADENCE_CONFIG_PATH`, else `cadence.toml`
//!    in the working directory if present
//! 3. Environment variables `CADENCE__SECTION__KEY` (a `.env` file is read
//!    first)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::flow::combinators::DEFAULT_RETRYABLE_ERRORS;
use crate::triggers::TriggerSettings;

pub const CONFIG_PATH_ENV: &str = "CADENCE_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "cadence.toml";
const ENV_PREFIX: &str = "CADENCE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub triggers: TriggerConfig,
    pub resources: ResourceConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

/// Defaults for combinators called without explicit limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Error fragments `retry_on` treats as transient
    pub retryable_errors: Vec<String>,
    pub timeout_seconds: f64,
    pub throttle_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 1000,
            retryable_errors: DEFAULT_RETRYABLE_ERRORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_seconds: 30.0,
            throttle_ms: 1000,
        }
    }
}

impl EngineConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds).unwrap_or(Duration::MAX)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub event_poll_interval_ms: u64,
    pub event_error_backoff_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        let defaults = TriggerSettings::default();
        Self {
            event_poll_interval_ms: defaults.event_poll_interval.as_millis() as u64,
            event_error_backoff_ms: defaults.event_error_backoff.as_millis() as u64,
        }
    }
}

impl TriggerConfig {
    pub fn settings(&self) -> TriggerSettings {
        TriggerSettings {
            event_poll_interval: Duration::from_millis(self.event_poll_interval_ms),
            event_error_backoff: Duration::from_millis(self.event_error_backoff_ms),
            ..TriggerSettings::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Directory `resource(path)` reads below
    pub root: PathBuf,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

/// Authorization for `work`
///
/// Disabled means no policy is consulted (the offline state).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub enabled: bool,
    pub allow: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "cadence_core=info".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default search path and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "engine.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.engine.timeout_seconds <= 0.0
            || Duration::try_from_secs_f64(self.engine.timeout_seconds).is_err()
        {
            return Err(ConfigError::Invalid(
                "engine.timeout_seconds must be a positive, representable duration".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore environment variables and `.env` (for tests)
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        if !self.skip_env {
            dotenvy::dotenv().ok();
        }

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        let explicit = self.config_path.or_else(|| {
            if self.skip_env {
                None
            } else {
                std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from)
            }
        });
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path));
                }
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                builder = builder.add_source(
                    config::File::with_name(DEFAULT_CONFIG_FILE)
                        .format(config::FileFormat::Toml)
                        .required(false),
                );
            }
        }

        if !self.skip_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("engine.retryable_errors")
                    .with_list_parse_key("policy.allow")
                    .try_parsing(true),
            );
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }
}
