//! Content Immutability Tracker
//!
//! Records the content hash an action was based on and later re-reads the
//! content from its sources to confirm it still hashes the same. Inscription
//! content is immutable on Bitcoin, so a mismatch points at the resolution
//! layer or a data source, not at the inscription.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use crate::content::ContentResolver;
use crate::derivation::InscriptionId;
use crate::types::ContentHash;

/// Hash captured at action time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImmutabilitySnapshot {
    pub content_id: InscriptionId,
    pub content_hash: ContentHash,
    pub captured_at: DateTime<Utc>,
    pub source_label: String,
}

/// Result of re-verifying a hash against the live sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub content_id: InscriptionId,
    pub unchanged: bool,
    pub original_hash: ContentHash,
    /// `None` when the content could not be re-fetched
    pub current_hash: Option<ContentHash>,
    /// Since the snapshot, or the verification itself when none exists
    pub elapsed: Duration,
    pub source_name: Option<String>,
    pub error: Option<String>,
}

/// Snapshot store plus verification through the content resolver
pub struct ImmutabilityTracker {
    resolver: Arc<ContentResolver>,
    snapshots: DashMap<InscriptionId, ImmutabilitySnapshot>,
}

impl ImmutabilityTracker {
    pub fn new(resolver: Arc<ContentResolver>) -> Self {
        Self {
            resolver,
            snapshots: DashMap::new(),
        }
    }

    /// Store or overwrite the snapshot for `content_id`
    pub fn snapshot(
        &self,
        content_id: InscriptionId,
        content_hash: ContentHash,
        source_label: impl Into<String>,
    ) -> ImmutabilitySnapshot {
        let snapshot = ImmutabilitySnapshot {
            content_id,
            content_hash,
            captured_at: Utc::now(),
            source_label: source_label.into(),
        };
        self.snapshots.insert(content_id, snapshot.clone());
        snapshot
    }

    pub fn get(&self, content_id: &InscriptionId) -> Option<ImmutabilitySnapshot> {
        self.snapshots.get(content_id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Re-fetch, bypassing the cache, and compare against `original_hash`
    #[instrument(skip(self), fields(content_id = %content_id))]
    pub async fn verify(&self, content_id: &InscriptionId, original_hash: &ContentHash) -> VerificationResult {
        let started = Instant::now();
        let since_snapshot = self.snapshots.get(content_id).and_then(|s| {
            (Utc::now() - s.captured_at).to_std().ok()
        });

        let (current_hash, source_name, error) = match self.resolver.compute_fresh_hash(content_id).await {
            Ok(hashed) => (Some(hashed.hash), Some(hashed.source_name), None),
            Err(e) => (None, None, Some(format!("{e} (remediation: {})", e.remediation()))),
        };

        let unchanged = current_hash.as_ref() == Some(original_hash);
        let result = VerificationResult {
            content_id: *content_id,
            unchanged,
            original_hash: *original_hash,
            current_hash,
            elapsed: since_snapshot.unwrap_or_else(|| started.elapsed()),
            source_name,
            error,
        };

        if unchanged {
            info!(source = ?result.source_name, "Content hash unchanged");
        } else {
            warn!(
                original = %original_hash,
                current = ?result.current_hash.map(|h| h.to_hex()),
                error = ?result.error,
                "Content hash could not be confirmed"
            );
        }
        result
    }

    /// Verify against the stored snapshot; `None` when nothing was snapshot
    pub async fn verify_snapshot(&self, content_id: &InscriptionId) -> Option<VerificationResult> {
        let original = self.snapshots.get(content_id).map(|s| s.content_hash)?;
        Some(self.verify(content_id, &original).await)
    }
}
