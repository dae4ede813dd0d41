//! Content Resolution Layer
//!
//! Multi-source fetch with failover, a TTL cache in front, and SHA-256
//! hashing on top. Used for content-hash auto-fill during seal construction
//! and by the immutability tracker.
//!
//! Concurrent misses for the same id share one network fetch: the first
//! caller runs it, later callers of the same burst receive its result,
//! including a failure.

pub mod cache;
pub mod errors;
pub mod sources;

pub use cache::{ContentCache, ContentCacheEntry};
pub use errors::{ContentError, SourceError, SourceFailure};
pub use sources::{ContentSource, FetchedContent, HttpContentSource};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::config::ContentConfig;
use crate::derivation::InscriptionId;
use crate::lifecycle::WorkerHandle;
use crate::metrics::{metrics, Timer};
use crate::types::ContentHash;

/// Source label attached to cache hits
pub const CACHE_SOURCE: &str = "cache";

/// Content returned by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub content_id: InscriptionId,
    pub bytes: Bytes,
    pub content_type: Option<String>,
    /// Name of the source that served the bytes, or [`CACHE_SOURCE`]
    pub source_name: String,
    pub fetched_at: DateTime<Utc>,
}

impl ResolvedContent {
    pub fn hash(&self) -> ContentHash {
        ContentHash::digest(&self.bytes)
    }

    pub fn from_cache(&self) -> bool {
        self.source_name == CACHE_SOURCE
    }
}

/// Content hash plus where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedContent {
    pub hash: ContentHash,
    pub source_name: String,
    pub size: usize,
}

/// Outcome of one in-flight fetch, shared by every caller of that burst
type Flight = Arc<OnceCell<Result<ResolvedContent, ContentError>>>;

/// Drops the in-flight entry once its burst is over
///
/// The entry goes when the outcome is set, or when the caller that opened it
/// is cancelled first. Only the entry this caller joined is removed; a newer
/// burst for the same id keeps its own.
struct InflightGuard<'a> {
    inflight: &'a DashMap<InscriptionId, Flight>,
    id: InscriptionId,
    flight: Flight,
    opened: bool,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if self.opened || self.flight.initialized() {
            self.inflight.remove_if(&self.id, |_, f| Arc::ptr_eq(f, &self.flight));
        }
    }
}

/// Cached, failover-aware content resolver
pub struct ContentResolver {
    sources: Vec<Arc<dyn ContentSource>>,
    cache: Arc<ContentCache>,
    inflight: DashMap<InscriptionId, Flight>,
    attempt_timeout: Duration,
    max_bytes: u64,
    sweep_interval: Duration,
    sweeper: parking_lot::Mutex<Option<WorkerHandle>>,
}

impl ContentResolver {
    /// Build a resolver over arbitrary sources; they are tried in priority order
    pub fn new(
        mut sources: Vec<Arc<dyn ContentSource>>,
        cache_ttl: Duration,
        attempt_timeout: Duration,
        max_bytes: u64,
        sweep_interval: Duration,
    ) -> Self {
        // Stable sort keeps config order among equal priorities
        sources.sort_by_key(|s| s.priority());
        Self {
            sources,
            cache: Arc::new(ContentCache::new(cache_ttl)),
            inflight: DashMap::new(),
            attempt_timeout,
            max_bytes,
            sweep_interval,
            sweeper: parking_lot::Mutex::new(None),
        }
    }

    /// Build HTTP sources from configuration
    pub fn from_config(config: &ContentConfig) -> Result<Self, ContentError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("teleburn/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ContentError::Configuration(e.to_string()))?;

        let sources = config
            .sources
            .iter()
            .map(|s| Arc::new(HttpContentSource::new(s, client.clone())) as Arc<dyn ContentSource>)
            .collect();

        Ok(Self::new(
            sources,
            Duration::from_secs(config.cache_ttl_secs),
            Duration::from_millis(config.attempt_timeout_ms),
            config.max_content_bytes,
            Duration::from_secs(config.sweep_interval_secs),
        ))
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Fetch content, serving from cache while the entry is live
    ///
    /// Concurrent misses for one id share the leader's outcome, success or
    /// failure, so the sources are walked once per burst.
    #[instrument(skip(self), fields(content_id = %id))]
    pub async fn fetch_content(&self, id: &InscriptionId) -> Result<ResolvedContent, ContentError> {
        if let Some(hit) = self.cached(id) {
            return Ok(hit);
        }

        let (flight, opened) = match self.inflight.entry(*id) {
            Entry::Occupied(e) => (Arc::clone(e.get()), false),
            Entry::Vacant(e) => (Arc::clone(e.insert(Arc::new(OnceCell::new())).value()), true),
        };
        let guard = InflightGuard {
            inflight: &self.inflight,
            id: *id,
            flight,
            opened,
        };

        guard
            .flight
            .get_or_init(|| async {
                // A previous burst may have filled the cache meanwhile
                match self.cached(id) {
                    Some(hit) => Ok(hit),
                    None => {
                        metrics().content_cache_misses.inc();
                        self.fetch_and_store(id).await
                    }
                }
            })
            .await
            .clone()
    }

    /// Re-read the data sources, ignoring any cached copy
    ///
    /// The fresh result still replaces the cache entry.
    #[instrument(skip(self), fields(content_id = %id))]
    pub async fn fetch_fresh(&self, id: &InscriptionId) -> Result<ResolvedContent, ContentError> {
        self.fetch_and_store(id).await
    }

    /// Fetch (possibly cached) content and hash it
    pub async fn compute_content_hash(&self, id: &InscriptionId) -> Result<HashedContent, ContentError> {
        let content = self.fetch_content(id).await?;
        Ok(Self::hashed(&content))
    }

    /// Fetch fresh content and hash it
    pub async fn compute_fresh_hash(&self, id: &InscriptionId) -> Result<HashedContent, ContentError> {
        let content = self.fetch_fresh(id).await?;
        Ok(Self::hashed(&content))
    }

    fn hashed(content: &ResolvedContent) -> HashedContent {
        HashedContent {
            hash: content.hash(),
            source_name: content.source_name.clone(),
            size: content.bytes.len(),
        }
    }

    fn cached(&self, id: &InscriptionId) -> Option<ResolvedContent> {
        let entry = self.cache.get(id)?;
        metrics().content_cache_hits.inc();
        debug!(content_id = %id, age_secs = entry.age().as_secs(), origin = %entry.source_name, "Content cache hit");
        Some(ResolvedContent {
            content_id: entry.content_id,
            bytes: entry.bytes,
            content_type: entry.content_type,
            source_name: CACHE_SOURCE.to_string(),
            fetched_at: entry.fetched_at,
        })
    }

    async fn fetch_and_store(&self, id: &InscriptionId) -> Result<ResolvedContent, ContentError> {
        let (source_name, fetched) = self.fetch_from_sources(id).await?;
        let entry = self
            .cache
            .insert(*id, fetched.bytes, fetched.content_type, &source_name);
        Ok(ResolvedContent {
            content_id: entry.content_id,
            bytes: entry.bytes,
            content_type: entry.content_type,
            source_name: entry.source_name,
            fetched_at: entry.fetched_at,
        })
    }

    async fn fetch_from_sources(
        &self,
        id: &InscriptionId,
    ) -> Result<(String, FetchedContent), ContentError> {
        let timeout_ms = self.attempt_timeout.as_millis() as u64;
        let mut failures = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let timer = Timer::new();
            let attempt = tokio::time::timeout(self.attempt_timeout, source.fetch(id, self.max_bytes)).await;
            timer.observe_duration(&metrics().content_fetch_latency);

            let error = match attempt {
                Ok(Ok(content)) => {
                    info!(
                        content_id = %id,
                        source = %source.name(),
                        size = content.bytes.len(),
                        "Content fetched"
                    );
                    return Ok((source.name().to_string(), content));
                }
                Ok(Err(SourceError::TooLarge { observed, limit })) => {
                    warn!(content_id = %id, source = %source.name(), observed, limit, "Content exceeds size ceiling");
                    return Err(ContentError::ContentTooLarge {
                        content_id: *id,
                        source_name: source.name().to_string(),
                        observed,
                        limit,
                    });
                }
                Ok(Err(e)) => e,
                Err(_) => SourceError::Timeout(timeout_ms),
            };

            metrics().content_fetch_failures.inc();
            warn!(content_id = %id, source = %source.name(), error = %error, "Content source failed, trying next");
            failures.push(SourceFailure {
                source_name: source.name().to_string(),
                error,
            });
        }

        let all_timed_out = !failures.is_empty()
            && failures
                .iter()
                .all(|f| matches!(f.error, SourceError::Timeout(_)));

        if all_timed_out {
            Err(ContentError::Timeout {
                content_id: *id,
                attempts: failures.len(),
                timeout_ms,
            })
        } else {
            Err(ContentError::AllSourcesFailed {
                content_id: *id,
                failures,
            })
        }
    }

    /// Start the periodic expiry sweep; a second call is a no-op
    pub fn start_sweeper(&self) {
        let mut slot = self.sweeper.lock();
        if slot.is_some() {
            return;
        }
        let cache = self.cache.clone();
        *slot = Some(WorkerHandle::spawn_periodic(
            "content-cache-sweeper",
            self.sweep_interval,
            move || {
                let cache = cache.clone();
                async move {
                    let removed = cache.sweep();
                    metrics().content_cache_evictions.inc_by(removed as u64);
                }
            },
        ));
    }

    /// Stop the sweeper if running
    pub async fn stop(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub fn sweeper_running(&self) -> bool {
        self.sweeper.lock().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl std::fmt::Debug for ContentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentResolver")
            .field("sources", &self.source_names())
            .field("cached", &self.cache.len())
            .field("attempt_timeout", &self.attempt_timeout)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockContentSource;

    fn id() -> InscriptionId {
        InscriptionId::new([0x11; 32], 0)
    }

    fn resolver(sources: &[&Arc<MockContentSource>]) -> ContentResolver {
        ContentResolver::new(
            sources
                .iter()
                .map(|s| Arc::clone(s) as Arc<dyn ContentSource>)
                .collect(),
            Duration::from_secs(3600),
            Duration::from_secs(5),
            1024,
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn test_second_fetch_within_ttl_is_served_from_cache() {
        let source = Arc::new(MockContentSource::new("primary", 0));
        source.put(id(), b"inscription bytes".to_vec());
        let resolver = resolver(&[&source]);

        let first = resolver.fetch_content(&id()).await.unwrap();
        let second = resolver.fetch_content(&id()).await.unwrap();

        assert_eq!(first.source_name, "primary");
        assert!(second.from_cache());
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_after_ttl_hits_network_again() {
        let source = Arc::new(MockContentSource::new("primary", 0));
        source.put(id(), b"abc".to_vec());
        let resolver = resolver(&[&source]);

        resolver.fetch_content(&id()).await.unwrap();
        tokio::time::advance(Duration::from_secs(3601)).await;
        let again = resolver.fetch_content(&id()).await.unwrap();

        assert_eq!(again.source_name, "primary");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failover_to_lower_priority_source() {
        let primary = Arc::new(MockContentSource::new("primary", 0));
        primary.fail_with(SourceError::Status(503));
        let backup = Arc::new(MockContentSource::new("backup", 1));
        backup.put(id(), b"abc".to_vec());

        // Registration order must not matter, priority does
        let resolver = resolver(&[&backup, &primary]);
        let content = resolver.fetch_content(&id()).await.unwrap();

        assert_eq!(content.source_name, "backup");
        assert_eq!(primary.calls(), 1);
        assert_eq!(
            resolver.compute_content_hash(&id()).await.unwrap().hash,
            ContentHash::digest(b"abc")
        );
    }

    #[tokio::test]
    async fn test_all_sources_failed_is_a_value() {
        let a = Arc::new(MockContentSource::new("a", 0));
        let b = Arc::new(MockContentSource::new("b", 1));
        b.fail_with(SourceError::Transport("refused".to_string()));
        let resolver = resolver(&[&a, &b]);

        match resolver.fetch_content(&id()).await {
            Err(ContentError::AllSourcesFailed { failures, .. }) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].error, SourceError::NotFound);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_too_large_stops_immediately() {
        let big = Arc::new(MockContentSource::new("big", 0));
        big.put(id(), vec![0u8; 2048]);
        let next = Arc::new(MockContentSource::new("next", 1));
        next.put(id(), b"small".to_vec());
        let resolver = resolver(&[&big, &next]);

        let err = resolver.fetch_content(&id()).await.unwrap_err();
        assert!(matches!(err, ContentError::ContentTooLarge { observed: 2048, limit: 1024, .. }));
        assert_eq!(next.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_timing_out_reports_timeout() {
        let slow = Arc::new(MockContentSource::new("slow", 0));
        slow.put(id(), b"abc".to_vec());
        slow.set_delay(Duration::from_secs(60));
        let resolver = resolver(&[&slow]);

        let err = resolver.fetch_content(&id()).await.unwrap_err();
        assert!(matches!(err, ContentError::Timeout { attempts: 1, timeout_ms: 5000, .. }));
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let source = Arc::new(MockContentSource::new("primary", 0));
        source.put(id(), b"abc".to_vec());
        source.set_delay(Duration::from_millis(50));
        let resolver = Arc::new(resolver(&[&source]));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let r = resolver.clone();
                tokio::spawn(async move { r.fetch_content(&id()).await })
            })
            .collect();
        for t in futures::future::join_all(tasks).await {
            assert_eq!(t.unwrap().unwrap().bytes, Bytes::from_static(b"abc"));
        }

        assert_eq!(source.calls(), 1);
        assert!(resolver.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_source_walk() {
        let source = Arc::new(MockContentSource::new("primary", 0));
        source.fail_with(SourceError::Status(503));
        source.set_delay(Duration::from_millis(100));
        let resolver = Arc::new(resolver(&[&source]));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let r = resolver.clone();
                tokio::spawn(async move { r.fetch_content(&id()).await })
            })
            .collect();
        for t in futures::future::join_all(tasks).await {
            assert!(matches!(t.unwrap(), Err(ContentError::AllSourcesFailed { .. })));
        }

        assert_eq!(source.calls(), 1);
        assert!(resolver.inflight.is_empty());

        // The failure is not cached; the next burst walks the sources again
        assert!(resolver.fetch_content(&id()).await.is_err());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_leaves_no_inflight_entry() {
        let source = Arc::new(MockContentSource::new("primary", 0));
        source.put(id(), b"abc".to_vec());
        source.set_delay(Duration::from_millis(200));
        let resolver = Arc::new(resolver(&[&source]));

        let r = resolver.clone();
        let task = tokio::spawn(async move { r.fetch_content(&id()).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(resolver.inflight.len(), 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(resolver.inflight.is_empty());

        source.set_delay(Duration::ZERO);
        let fetched = resolver.fetch_content(&id()).await.unwrap();
        assert_eq!(fetched.bytes, Bytes::from_static(b"abc"));
        assert!(resolver.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_fresh_bypasses_cache() {
        let source = Arc::new(MockContentSource::new("primary", 0));
        source.put(id(), b"v1".to_vec());
        let resolver = resolver(&[&source]);
        resolver.fetch_content(&id()).await.unwrap();

        source.put(id(), b"v2".to_vec());
        let fresh = resolver.fetch_fresh(&id()).await.unwrap();
        assert_eq!(fresh.bytes, Bytes::from_static(b"v2"));
        assert_eq!(source.calls(), 2);

        // Cache now holds the fresh copy
        let cached = resolver.fetch_content(&id()).await.unwrap();
        assert_eq!(cached.bytes, Bytes::from_static(b"v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_lifecycle() {
        let source = Arc::new(MockContentSource::new("primary", 0));
        source.put(id(), b"abc".to_vec());
        let resolver = ContentResolver::new(
            vec![source as Arc<dyn ContentSource>],
            Duration::from_secs(10),
            Duration::from_secs(5),
            1024,
            Duration::from_secs(15),
        );

        resolver.start_sweeper();
        resolver.start_sweeper();
        assert!(resolver.sweeper_running());

        resolver.fetch_content(&id()).await.unwrap();
        assert_eq!(resolver.cache().len(), 1);
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(resolver.cache().is_empty());

        resolver.stop().await;
        assert!(!resolver.sweeper_running());
    }
}
