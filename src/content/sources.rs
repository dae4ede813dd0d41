//! Content sources: where inscription bytes come from
//!
//! Sources only fetch. Timeouts, ordering and caching live in the resolver so
//! every source gets the same treatment.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::debug;

use super::errors::SourceError;
use crate::config::ContentSourceConfig;
use crate::derivation::InscriptionId;

/// Placeholder substituted with the inscription id in url templates
pub const ID_PLACEHOLDER: &str = "{id}";

/// Raw bytes returned by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// A single origin of inscription content
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Lower value is tried first
    fn priority(&self) -> u32;

    /// Fetch the full content, refusing anything above `max_bytes`
    async fn fetch(&self, id: &InscriptionId, max_bytes: u64) -> Result<FetchedContent, SourceError>;
}

/// Ordinals content endpoint reached over HTTPS
#[derive(Debug, Clone)]
pub struct HttpContentSource {
    name: String,
    url_template: String,
    priority: u32,
    client: reqwest::Client,
}

impl HttpContentSource {
    pub fn new(config: &ContentSourceConfig, client: reqwest::Client) -> Self {
        Self {
            name: config.name.clone(),
            url_template: config.url_template.clone(),
            priority: config.priority,
            client,
        }
    }

    pub fn url_for(&self, id: &InscriptionId) -> String {
        self.url_template.replace(ID_PLACEHOLDER, &id.to_string())
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch(&self, id: &InscriptionId, max_bytes: u64) -> Result<FetchedContent, SourceError> {
        let url = self.url_for(id);
        debug!(source = %self.name, url = %url, "Fetching content");

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound),
            other => return Err(SourceError::Status(other.as_u16())),
        }

        // Declared size is checked before any body is buffered
        if let Some(declared) = response.content_length() {
            if declared > max_bytes {
                return Err(SourceError::TooLarge {
                    observed: declared,
                    limit: max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut buf = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?
        {
            let observed = (buf.len() + chunk.len()) as u64;
            if observed > max_bytes {
                return Err(SourceError::TooLarge {
                    observed,
                    limit: max_bytes,
                });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(FetchedContent {
            bytes: buf.freeze(),
            content_type,
        })
    }
}
