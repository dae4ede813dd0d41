//! Configuration module for the teleburn pipeline
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.
//! Configuration is read once at start and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::content::sources::ID_PLACEHOLDER;
use crate::derivation::{DomainTag, DEFAULT_DOMAIN_TAG};
use crate::preflight::MAX_COMPUTE_UNITS;
use crate::rpc_manager::RpcManagerConfig;
use crate::tx_builder::fees::{FeeTier, DEFAULT_COMPUTE_UNIT_LIMIT};
use crate::tx_builder::RetireMethod;

/// Environment variable overriding `[rpc].endpoints` (comma separated)
pub const RPC_ENDPOINTS_ENV: &str = "RPC_ENDPOINTS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// RPC endpoints and failover
    #[serde(default)]
    pub rpc: RpcManagerConfig,

    /// Inscription content sources and cache
    #[serde(default)]
    pub content: ContentConfig,

    /// Priority fee tiers and compute budget
    #[serde(default)]
    pub fees: FeeConfig,

    #[serde(default)]
    pub retire: RetireConfig,

    #[serde(default)]
    pub derivation: DerivationConfig,

    /// Logging and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// One inscription content origin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentSourceConfig {
    pub name: String,

    /// URL with an `{id}` placeholder for the inscription id
    pub url_template: String,

    /// Lower value is tried first
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentConfig {
    #[serde(default = "default_content_sources")]
    pub sources: Vec<ContentSourceConfig>,

    /// Cache entry lifetime in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Interval of the background sweep purging expired entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Timeout for a single source attempt in milliseconds
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,

    /// Hard ceiling on content size
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeConfig {
    /// Tier used when a request does not name one
    #[serde(default)]
    pub default_tier: FeeTier,

    /// Tier minimums in micro-lamports per compute unit
    #[serde(default = "default_min_low")]
    pub min_low_micro_lamports: u64,

    #[serde(default = "default_min_medium")]
    pub min_medium_micro_lamports: u64,

    #[serde(default = "default_min_high")]
    pub min_high_micro_lamports: u64,

    /// Price used when fee samples are unavailable
    #[serde(default = "default_fallback_price")]
    pub fallback_micro_lamports: u64,

    /// Cap on any computed price
    #[serde(default = "default_max_price")]
    pub max_micro_lamports: u64,

    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,
}

impl FeeConfig {
    pub fn minimum_for(&self, tier: FeeTier) -> u64 {
        match tier {
            FeeTier::Low => self.min_low_micro_lamports,
            FeeTier::Medium => self.min_medium_micro_lamports,
            FeeTier::High => self.min_high_micro_lamports,
        }
    }
}

/// Canonical retire strategy of this deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetireConfig {
    #[serde(default)]
    pub method: RetireMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DerivationConfig {
    /// Part of the protocol version; changing it changes every derived address
    #[serde(default = "default_domain_tag")]
    pub domain_tag: String,
}

impl DerivationConfig {
    pub fn domain(&self) -> DomainTag {
        DomainTag::new(self.domain_tag.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitoringConfig {
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Print the Prometheus exposition after a CLI run
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// Default value functions
fn default_content_sources() -> Vec<ContentSourceConfig> {
    [
        ("ordinals.com", "https://ordinals.com/content/{id}"),
        ("ord.io", "https://ord.io/content/{id}"),
        ("ordiscan.com", "https://ordiscan.com/content/{id}"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (name, url))| ContentSourceConfig {
        name: name.to_string(),
        url_template: url.to_string(),
        priority: i as u32,
    })
    .collect()
}
fn default_cache_ttl() -> u64 { 3_600 }
fn default_sweep_interval() -> u64 { 300 }
fn default_attempt_timeout() -> u64 { 10_000 }
fn default_max_content_bytes() -> u64 { 100 * 1024 * 1024 }
fn default_min_low() -> u64 { 1_000 }
fn default_min_medium() -> u64 { 5_000 }
fn default_min_high() -> u64 { 10_000 }
fn default_fallback_price() -> u64 { 10_000 }
fn default_max_price() -> u64 { 1_000_000 }
fn default_compute_unit_limit() -> u32 { DEFAULT_COMPUTE_UNIT_LIMIT }
fn default_domain_tag() -> String { DEFAULT_DOMAIN_TAG.to_string() }
fn default_true() -> bool { true }

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            sources: default_content_sources(),
            cache_ttl_secs: default_cache_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            attempt_timeout_ms: default_attempt_timeout(),
            max_content_bytes: default_max_content_bytes(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            default_tier: FeeTier::default(),
            min_low_micro_lamports: default_min_low(),
            min_medium_micro_lamports: default_min_medium(),
            min_high_micro_lamports: default_min_high(),
            fallback_micro_lamports: default_fallback_price(),
            max_micro_lamports: default_max_price(),
            compute_unit_limit: default_compute_unit_limit(),
        }
    }
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            domain_tag: default_domain_tag(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            enable_metrics: default_true(),
        }
    }
}

impl ContentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Validation(
                "At least one content source must be configured".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(&source.name) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate content source name: {}",
                    source.name
                )));
            }
            if !source.url_template.starts_with("http://") && !source.url_template.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "Invalid URL template for {}: {}",
                    source.name, source.url_template
                )));
            }
            if !source.url_template.contains(ID_PLACEHOLDER) {
                return Err(ConfigError::Validation(format!(
                    "URL template for {} lacks the {ID_PLACEHOLDER} placeholder",
                    source.name
                )));
            }
        }

        if self.cache_ttl_secs == 0 || self.sweep_interval_secs == 0 || self.attempt_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "Cache TTL, sweep interval and attempt timeout must be > 0".to_string(),
            ));
        }
        if self.max_content_bytes == 0 {
            return Err(ConfigError::Validation("max_content_bytes must be > 0".to_string()));
        }
        Ok(())
    }
}

impl FeeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compute_unit_limit == 0 || u64::from(self.compute_unit_limit) > MAX_COMPUTE_UNITS {
            return Err(ConfigError::Validation(format!(
                "compute_unit_limit must be within 1..={MAX_COMPUTE_UNITS}, got {}",
                self.compute_unit_limit
            )));
        }
        if !(self.min_low_micro_lamports <= self.min_medium_micro_lamports
            && self.min_medium_micro_lamports <= self.min_high_micro_lamports)
        {
            return Err(ConfigError::Validation(
                "Tier minimums must satisfy low <= medium <= high".to_string(),
            ));
        }
        if self.min_high_micro_lamports > self.max_micro_lamports
            || self.fallback_micro_lamports > self.max_micro_lamports
        {
            return Err(ConfigError::Validation(
                "Tier minimums and fallback price must not exceed max_micro_lamports".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `.env`, the file if it exists (defaults otherwise), apply
    /// environment overrides, then validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let mut config = if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            Self::from_file(path)?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        if let Ok(list) = std::env::var(RPC_ENDPOINTS_ENV) {
            config.apply_endpoint_override(&list)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Replace the endpoint table with a comma separated list
    pub fn apply_endpoint_override(&mut self, list: &str) -> Result<(), ConfigError> {
        let endpoints = RpcManagerConfig::endpoints_from_list(list)?;
        info!(count = endpoints.len(), "Endpoint table overridden from {}", RPC_ENDPOINTS_ENV);
        self.rpc.endpoints = endpoints;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rpc.validate()?;
        self.content.validate()?;
        self.fees.validate()?;
        if self.derivation.domain_tag.trim().is_empty() {
            return Err(ConfigError::Validation("derivation.domain_tag must not be empty".to_string()));
        }
        Ok(())
    }
}
