use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Configuration for an individual RPC endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcEndpointConfig {
    /// The RPC endpoint URL
    pub url: String,

    /// Provider label for logs and diagnostics (Helius, QuickNode, public...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Lower value is preferred
    #[serde(default)]
    pub priority: u32,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_provider() -> String {
    "public".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Endpoint failover configuration (`[rpc]` section)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcManagerConfig {
    /// List of RPC endpoints
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<RpcEndpointConfig>,

    /// Background probe interval in seconds
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Probe timeout in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Consecutive failures before an endpoint is marked unhealthy
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_endpoints() -> Vec<RpcEndpointConfig> {
    vec![RpcEndpointConfig {
        url: "https://api.mainnet-beta.solana.com".to_string(),
        provider: default_provider(),
        priority: 0,
        timeout_ms: default_timeout_ms(),
    }]
}

fn default_probe_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5_000
}

fn default_failure_threshold() -> u32 {
    3
}

impl Default for RpcManagerConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            probe_interval_secs: default_probe_interval(),
            probe_timeout_ms: default_probe_timeout(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl RpcManagerConfig {
    /// Parse a comma separated endpoint list, priority in list order
    /// Expected format: RPC_ENDPOINTS=url1,url2,url3
    pub fn endpoints_from_list(list: &str) -> Result<Vec<RpcEndpointConfig>, ConfigError> {
        let endpoints: Vec<RpcEndpointConfig> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, url)| RpcEndpointConfig {
                url: url.to_string(),
                provider: provider_from_url(url),
                priority: i as u32,
                timeout_ms: default_timeout_ms(),
            })
            .collect();

        if endpoints.is_empty() {
            return Err(ConfigError::Validation("No RPC endpoints provided".to_string()));
        }
        Ok(endpoints)
    }

    /// Create a default configuration from a list of URLs
    pub fn from_urls(urls: &[String]) -> Self {
        let endpoints = urls
            .iter()
            .enumerate()
            .map(|(i, url)| RpcEndpointConfig {
                url: url.clone(),
                provider: provider_from_url(url),
                priority: i as u32,
                timeout_ms: default_timeout_ms(),
            })
            .collect();

        Self {
            endpoints,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::Validation(
                "At least one RPC endpoint must be configured".to_string(),
            ));
        }

        let mut seen_urls = std::collections::HashSet::new();
        for endpoint in &self.endpoints {
            if !seen_urls.insert(&endpoint.url) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate RPC URL: {}",
                    endpoint.url
                )));
            }

            if !endpoint.url.starts_with("http://") && !endpoint.url.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "Invalid URL format: {}",
                    endpoint.url
                )));
            }

            if endpoint.timeout_ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "Invalid timeout_ms for {}: must be > 0",
                    endpoint.url
                )));
            }
        }

        if self.failure_threshold == 0 {
            return Err(ConfigError::Validation(
                "failure_threshold must be at least 1".to_string(),
            ));
        }

        if self.probe_interval_secs == 0 || self.probe_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "Probe interval and timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Best-effort provider label from well-known hostnames
fn provider_from_url(url: &str) -> String {
    let lower = url.to_lowercase();
    let label = if lower.contains("helius") {
        "helius"
    } else if lower.contains("quiknode") || lower.contains("quicknode") {
        "quicknode"
    } else if lower.contains("triton") || lower.contains("rpcpool") {
        "triton"
    } else if lower.contains("alchemy") {
        "alchemy"
    } else {
        "public"
    };
    label.to_string()
}
