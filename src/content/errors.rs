use std::fmt;
use thiserror::Error;

use crate::derivation::InscriptionId;

/// Failure of a single source attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Source answered with something other than 200 OK
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Attempt timed out after {0}ms")]
    Timeout(u64),

    /// Declared or streamed size crossed the ceiling
    #[error("Content exceeds {limit} bytes (observed {observed})")]
    TooLarge { observed: u64, limit: u64 },

    #[error("Content not found")]
    NotFound,
}

/// One failed attempt, kept for the aggregate error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_name: String,
    pub error: SourceError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_name, self.error)
    }
}

fn join_failures(failures: &[SourceFailure]) -> String {
    if failures.is_empty() {
        return "no sources configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Content resolution failures
///
/// Returned as values from the resolution layer; callers decide whether a
/// failure blocks their operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("All content sources failed for {content_id}: {}", join_failures(.failures))]
    AllSourcesFailed {
        content_id: InscriptionId,
        failures: Vec<SourceFailure>,
    },

    #[error("Content for {content_id} from {source_name} exceeds {limit} bytes (observed {observed})")]
    ContentTooLarge {
        content_id: InscriptionId,
        source_name: String,
        observed: u64,
        limit: u64,
    },

    /// Every attempt hit its per-attempt timeout
    #[error("Timed out fetching {content_id} after {attempts} attempts ({timeout_ms}ms each)")]
    Timeout {
        content_id: InscriptionId,
        attempts: usize,
        timeout_ms: u64,
    },

    #[error("Content source configuration error: {0}")]
    Configuration(String),
}

impl ContentError {
    pub fn content_id(&self) -> Option<&InscriptionId> {
        match self {
            Self::AllSourcesFailed { content_id, .. }
            | Self::ContentTooLarge { content_id, .. }
            | Self::Timeout { content_id, .. } => Some(content_id),
            Self::Configuration(_) => None,
        }
    }

    /// Transient failures may succeed on a later call
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::AllSourcesFailed { failures, .. } => failures.iter().any(|f| {
                matches!(
                    f.error,
                    SourceError::Transport(_) | SourceError::Timeout(_)
                ) || matches!(f.error, SourceError::Status(code) if code >= 500 || code == 429)
            }),
            Self::ContentTooLarge { .. } | Self::Configuration(_) => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::AllSourcesFailed { .. } | Self::ContentTooLarge { .. } => "content_integrity",
            Self::Timeout { .. } => "transient_network",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            Self::AllSourcesFailed { .. } => {
                "Check the inscription id exists and that at least one content source is reachable, or supply the content hash explicitly"
            }
            Self::ContentTooLarge { .. } => {
                "Content is above the hashing ceiling; compute the hash offline and supply it explicitly"
            }
            Self::Timeout { .. } => "Content sources are slow or unreachable; retry later or raise the per-attempt timeout",
            Self::Configuration(_) => "Fix the [content] section of the configuration file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> InscriptionId {
        InscriptionId::new([0xaa; 32], 0)
    }

    #[test]
    fn test_all_sources_failed_message_lists_attempts() {
        let err = ContentError::AllSourcesFailed {
            content_id: id(),
            failures: vec![
                SourceFailure {
                    source_name: "ordinals.com".to_string(),
                    error: SourceError::Status(404),
                },
                SourceFailure {
                    source_name: "ord.io".to_string(),
                    error: SourceError::Transport("connection refused".to_string()),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("ordinals.com: HTTP status 404"));
        assert!(msg.contains("ord.io: Transport error"));
        assert!(err.is_retryable());
        assert_eq!(err.category(), "content_integrity");
    }

    #[test]
    fn test_not_found_everywhere_is_not_retryable() {
        let err = ContentError::AllSourcesFailed {
            content_id: id(),
            failures: vec![SourceFailure {
                source_name: "ordinals.com".to_string(),
                error: SourceError::Status(404),
            }],
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_too_large_is_terminal() {
        let err = ContentError::ContentTooLarge {
            content_id: id(),
            source_name: "ord.io".to_string(),
            observed: 200,
            limit: 100,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.content_id(), Some(&id()));
    }
}
