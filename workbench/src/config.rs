//! Configuration management for the Period Analysis Workbench
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with PAW_ prefix

use std::path::PathBuf;
use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::WorkbenchResult;

/// Default history file name
pub const DEFAULT_STORE_FILE: &str = "analiz_gecmisi.json";

/// Main workbench configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Snapshot store configuration
    pub store: StoreConfig,

    /// Worker bridge configuration
    pub bridge: BridgeConfig,

    /// Optional UI capabilities
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Path of the history file
    pub path: PathBuf,

    /// Pause before a worker retries a failed read, in milliseconds
    pub read_retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    /// Maximum number of undelivered worker messages
    pub queue_capacity: usize,

    /// Interval between queue polls on the UI thread, in milliseconds
    pub poll_interval_ms: u64,

    /// Maximum messages handled per poll
    pub max_batch: usize,

    /// Per-worker join timeout on shutdown, in milliseconds
    pub join_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    /// Date picker widgets are available
    pub calendar: bool,

    /// Chart embedding is available
    pub plotting: bool,

    /// Search and tooltip helpers are available
    pub ui_helpers: bool,
}

impl Config {
    /// Load configuration from files and environment variables, then validate it
    pub fn load() -> WorkbenchResult<Self> {
        let config = Self::from_sources()?;
        config.validate()?;
        Ok(config)
    }

    fn from_sources() -> Result<Self, ConfigError> {
        let environment = std::env::var("PAW_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("store.path", DEFAULT_STORE_FILE)?
            .set_default("store.read_retry_delay_ms", 50)?
            .set_default("bridge.queue_capacity", 64)?
            .set_default("bridge.poll_interval_ms", 100)?
            .set_default("bridge.max_batch", 10)?
            .set_default("bridge.join_timeout_ms", 2000)?
            .set_default("ui.calendar", true)?
            .set_default("ui.plotting", true)?
            .set_default("ui.ui_helpers", true)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PAW_ prefix)
            .add_source(
                Environment::with_prefix("PAW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the worker bridge cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.queue_capacity == 0 {
            return Err(ConfigError::Message("bridge.queue_capacity must be at least 1".into()));
        }
        if self.bridge.max_batch == 0 {
            return Err(ConfigError::Message("bridge.max_batch must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            store: StoreConfig::default(),
            bridge: BridgeConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_FILE),
            read_retry_delay_ms: 50,
        }
    }
}

impl StoreConfig {
    pub fn read_retry_delay(&self) -> Duration {
        Duration::from_millis(self.read_retry_delay_ms)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            poll_interval_ms: 100,
            max_batch: 10,
            join_timeout_ms: 2000,
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            calendar: true,
            plotting: true,
            ui_helpers: true,
        }
    }
}
