use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_rpc_client_api::request::RpcError;
use std::time::Duration;
use thiserror::Error;

/// JSON-RPC code a node returns for an expired or unknown blockhash
const BLOCKHASH_NOT_FOUND_CODE: i64 = -32002;

/// Failures of a chain read, per endpoint or for the whole pool
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcManagerError {
    /// Network-level failure: connect, DNS, TLS, reset
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// `timeout_ms` is 0 when the client did not report its bound;
    /// [`RpcManagerError::with_timeout`] fills it in
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// The node answered with a JSON-RPC error
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    /// Pool has nothing to route to
    #[error("No endpoints available (total: {total}, unhealthy: {unhealthy})")]
    NoHealthyEndpoints { total: usize, unhealthy: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RpcManagerError {
    /// Whether another attempt, on this or another endpoint, may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. }
            | Self::Timeout { .. }
            | Self::RateLimitExceeded { .. }
            | Self::BlockhashNotFound { .. }
            | Self::NoHealthyEndpoints { .. } => true,
            Self::Configuration(_) => false,
            Self::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c) || *c == 429)
            }
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            _ => "transient_network",
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded { .. } => "Add a higher-tier RPC endpoint or lower the request rate",
            Self::NoHealthyEndpoints { .. } => {
                "Configure at least one reachable RPC endpoint in [rpc] or RPC_ENDPOINTS"
            }
            Self::Configuration(_) => "Fix the [rpc] section of the configuration file",
            _ => "Every configured endpoint failed; check connectivity and retry",
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::RpcResponse { endpoint, .. }
            | Self::RateLimitExceeded { endpoint }
            | Self::BlockhashNotFound { endpoint } => Some(endpoint),
            Self::NoHealthyEndpoints { .. } | Self::Configuration(_) => None,
        }
    }

    /// Attach the attempt bound to a timeout that lacks one
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match self {
            Self::Timeout { endpoint, timeout_ms: 0 } => Self::Timeout {
                endpoint,
                timeout_ms: timeout.as_millis() as u64,
            },
            other => other,
        }
    }

    /// Map a client error by its kind; only untyped kinds fall back to the message
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        let endpoint = endpoint.to_string();
        match err.kind() {
            ClientErrorKind::Io(e) => Self::Transport {
                endpoint,
                message: e.to_string(),
            },
            ClientErrorKind::Reqwest(e) if e.is_timeout() => Self::Timeout {
                endpoint,
                timeout_ms: 0,
            },
            ClientErrorKind::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
                Some(429) => Self::RateLimitExceeded { endpoint },
                Some(status) => Self::RpcResponse {
                    endpoint,
                    message: e.to_string(),
                    code: Some(i64::from(status)),
                },
                None => Self::Transport {
                    endpoint,
                    message: e.to_string(),
                },
            },
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                Self::from_response(*code, message, endpoint)
            }
            _ => Self::classify(&err.to_string(), &endpoint),
        }
    }

    fn from_response(code: i64, message: &str, endpoint: String) -> Self {
        if code == BLOCKHASH_NOT_FOUND_CODE && message.to_lowercase().contains("blockhash") {
            return Self::BlockhashNotFound { endpoint };
        }
        Self::RpcResponse {
            endpoint,
            message: message.to_string(),
            code: Some(code),
        }
    }

    /// Best-effort classification of an error known only by its text
    pub fn classify(message: &str, endpoint: &str) -> Self {
        let lower = message.to_lowercase();
        let endpoint = endpoint.to_string();

        if lower.contains("blockhash not found") {
            Self::BlockhashNotFound { endpoint }
        } else if lower.contains("rate limit") || lower.contains("too many requests") || lower.contains("429") {
            Self::RateLimitExceeded { endpoint }
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout {
                endpoint,
                timeout_ms: 0,
            }
        } else if lower.contains("connection") || lower.contains("dns") || lower.contains("error sending request") {
            Self::Transport {
                endpoint,
                message: message.to_string(),
            }
        } else {
            Self::RpcResponse {
                endpoint,
                message: message.to_string(),
                code: None,
            }
        }
    }
}
