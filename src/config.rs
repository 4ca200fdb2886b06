use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::order::WorkflowKind;
use crate::utils::RetryConfig;
use crate::workflow::DEFAULT_MAX_CHAIN_DEPTH;

// ============================================================================
// Shop Configuration
// ============================================================================
//
// Loaded from a TOML file. Every field has a default, so an empty file (or
// no file at all) yields a working setup with all workflows enabled.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    /// Workflows mixed into the order, in installation order.
    pub workflows: Vec<WorkflowKind>,
    /// Prefix of order detail URLs; the order id and a trailing slash are
    /// appended.
    pub order_url_prefix: String,
    /// Upper bound on steps fired for one requested transition. Building
    /// the registry fails when a workflow's longest chain exceeds it.
    pub max_chain_depth: usize,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
    pub retry: RetrySettings,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            workflows: vec![WorkflowKind::PayInAdvance, WorkflowKind::CommissionGoods],
            order_url_prefix: "/shop/orders".to_string(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            log_filter: "info,shop_workflow=debug".to_string(),
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            multiplier: defaults.multiplier,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig {
            max_attempts: settings.max_attempts,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            multiplier: settings.multiplier,
        }
    }
}

impl ShopConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        content.parse()
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.order_url_prefix.trim().is_empty() {
            return Err(ConfigError::Validation("order_url_prefix cannot be empty".into()));
        }
        if self.max_chain_depth == 0 {
            return Err(ConfigError::Validation("max_chain_depth must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::Validation("retry.multiplier must be >= 1.0".into()));
        }
        Ok(())
    }
}

impl FromStr for ShopConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: ShopConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
