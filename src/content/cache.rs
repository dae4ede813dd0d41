//! TTL cache for resolved content
//!
//! Ages are measured on tokio's clock so paused-time tests can drive expiry.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::derivation::InscriptionId;

/// Cached copy of one inscription's content
#[derive(Debug, Clone)]
pub struct ContentCacheEntry {
    pub content_id: InscriptionId,
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub source_name: String,
    inserted: Instant,
}

impl ContentCacheEntry {
    pub fn age(&self) -> Duration {
        self.inserted.elapsed()
    }
}

/// Process-lifetime content cache keyed by inscription id
#[derive(Debug)]
pub struct ContentCache {
    entries: DashMap<InscriptionId, ContentCacheEntry>,
    ttl: Duration,
}

impl ContentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a live entry; expired entries are dropped, never served
    pub fn get(&self, id: &InscriptionId) -> Option<ContentCacheEntry> {
        let expired = match self.entries.get(id) {
            Some(entry) if entry.age() < self.ttl => return Some(entry.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(id, |_, e| e.age() >= self.ttl);
        }
        None
    }

    pub fn insert(
        &self,
        id: InscriptionId,
        bytes: Bytes,
        content_type: Option<String>,
        source_name: &str,
    ) -> ContentCacheEntry {
        let entry = ContentCacheEntry {
            content_id: id,
            bytes,
            content_type,
            fetched_at: Utc::now(),
            source_name: source_name.to_string(),
            inserted: Instant::now(),
        };
        self.entries.insert(id, entry.clone());
        entry
    }

    /// Purge expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.age() < self.ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Swept expired content entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_not_served_past_ttl() {
        let cache = ContentCache::new(Duration::from_secs(3600));
        let id = InscriptionId::new([1; 32], 0);
        cache.insert(id, Bytes::from_static(b"hello"), None, "ordinals.com");

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert_eq!(cache.get(&id).unwrap().bytes, Bytes::from_static(b"hello"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&id).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = ContentCache::new(Duration::from_secs(60));
        cache.insert(InscriptionId::new([1; 32], 0), Bytes::new(), None, "a");
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.insert(InscriptionId::new([2; 32], 0), Bytes::new(), None, "a");
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&InscriptionId::new([2; 32], 0)).is_some());
    }
}
