//! Prioritized RPC pool with health checks and transparent failover
//!
//! - Endpoints are ordered by priority (lower first), then config order
//! - Each endpoint is HEALTHY until N consecutive failures mark it UNHEALTHY;
//!   one success (call or probe) makes it HEALTHY again
//! - `with_failover` walks the healthy endpoints in order, bounding every
//!   attempt by the endpoint's timeout; when none are healthy it fails open
//!   and walks the full list
//! - A background probe (`get_version`) runs independently of foreground calls
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    transaction::VersionedTransaction,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use super::{ChainRpc, RpcManagerConfig, RpcManagerError, SimulationOutcome};
use crate::lifecycle::WorkerHandle;
use crate::metrics::{metrics, Timer};

/// Health status of an RPC endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health change event for propagation
#[derive(Debug, Clone)]
pub struct HealthChangeEvent {
    pub url: String,
    pub provider: String,
    pub old_status: HealthStatus,
    pub new_status: HealthStatus,
    pub consecutive_failures: u32,
    pub timestamp: Instant,
}

/// Point-in-time copy of an endpoint's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub url: String,
    pub provider: String,
    pub priority: u32,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub healthy: bool,
}

/// Failure/probe policy shared by every endpoint in the pool
#[derive(Debug, Clone, Copy)]
pub struct FailoverSettings {
    pub failure_threshold: u32,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for FailoverSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Endpoint with health tracking
struct PooledEndpoint {
    url: String,
    provider: String,
    priority: u32,
    timeout: Duration,
    client: Arc<dyn ChainRpc>,
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
    last_checked_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for PooledEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledEndpoint")
            .field("url", &self.url)
            .field("provider", &self.provider)
            .field("priority", &self.priority)
            .field("healthy", &self.healthy)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl PooledEndpoint {
    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    fn descriptor(&self) -> EndpointDescriptor {
        EndpointDescriptor {
            url: self.url.clone(),
            provider: self.provider.clone(),
            priority: self.priority,
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_checked_at: *self.last_checked_at.read(),
            healthy: self.is_healthy(),
        }
    }
}

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

/// Prioritized RPC pool with health checks and failover
pub struct RpcPool {
    /// Label of this pool's `rpc_healthy_endpoints` series
    id: String,
    endpoints: Vec<Arc<PooledEndpoint>>,
    settings: FailoverSettings,

    // Health event propagation
    health_event_tx: broadcast::Sender<HealthChangeEvent>,

    prober: parking_lot::Mutex<Option<WorkerHandle>>,
}

impl RpcPool {
    /// Create a pool over pre-built clients
    ///
    /// Each entry pairs an endpoint's configuration with the client that
    /// serves it; production code uses [`RpcPool::from_config`].
    pub fn new(
        endpoints: Vec<(super::RpcEndpointConfig, Arc<dyn ChainRpc>)>,
        settings: FailoverSettings,
    ) -> Self {
        let mut endpoints: Vec<Arc<PooledEndpoint>> = endpoints
            .into_iter()
            .map(|(config, client)| {
                Arc::new(PooledEndpoint {
                    url: config.url,
                    provider: config.provider,
                    priority: config.priority,
                    timeout: Duration::from_millis(config.timeout_ms),
                    client,
                    healthy: AtomicBool::new(true),
                    consecutive_failures: AtomicU32::new(0),
                    last_checked_at: parking_lot::RwLock::new(None),
                })
            })
            .collect();
        // Stable: config order breaks priority ties
        endpoints.sort_by_key(|e| e.priority);

        let (health_event_tx, _) = broadcast::channel(100);
        let id = format!("pool-{}", NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed));
        metrics()
            .rpc_healthy_endpoints
            .with_label_values(&[id.as_str()])
            .set(endpoints.len() as i64);

        Self {
            id,
            endpoints,
            settings,
            health_event_tx,
            prober: parking_lot::Mutex::new(None),
        }
    }

    /// Create a pool of nonblocking RPC clients from configuration
    pub fn from_config(config: &RpcManagerConfig) -> Result<Self, RpcManagerError> {
        config
            .validate()
            .map_err(|e| RpcManagerError::Configuration(e.to_string()))?;

        let endpoints = config
            .endpoints
            .iter()
            .map(|ep| {
                let client = RpcClient::new_with_timeout_and_commitment(
                    ep.url.clone(),
                    Duration::from_millis(ep.timeout_ms),
                    CommitmentConfig::confirmed(),
                );
                (ep.clone(), Arc::new(client) as Arc<dyn ChainRpc>)
            })
            .collect();

        Ok(Self::new(
            endpoints,
            FailoverSettings {
                failure_threshold: config.failure_threshold,
                probe_interval: Duration::from_secs(config.probe_interval_secs),
                probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            },
        ))
    }

    /// Process-unique id, used as the pool's metric label
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> FailoverSettings {
        self.settings
    }

    /// Subscribe to health change events
    pub fn subscribe_health_events(&self) -> broadcast::Receiver<HealthChangeEvent> {
        self.health_event_tx.subscribe()
    }

    /// Copies of every endpoint's state, in routing order
    pub fn snapshot(&self) -> Vec<EndpointDescriptor> {
        self.endpoints.iter().map(|e| e.descriptor()).collect()
    }

    pub fn healthy_count(&self) -> usize {
        self.endpoints.iter().filter(|e| e.is_healthy()).count()
    }

    /// Routing order for the next call
    ///
    /// Healthy endpoints by priority; the full list when none are healthy.
    fn candidates(&self) -> Vec<Arc<PooledEndpoint>> {
        let healthy: Vec<_> = self
            .endpoints
            .iter()
            .filter(|e| e.is_healthy())
            .cloned()
            .collect();

        if healthy.is_empty() && !self.endpoints.is_empty() {
            warn!(
                total = self.endpoints.len(),
                "No healthy RPC endpoints, failing open to the full list"
            );
            return self.endpoints.clone();
        }
        healthy
    }

    /// Run `op` against the best endpoint, failing over on any error
    ///
    /// Every attempt is bounded by the endpoint's timeout. Each failure counts
    /// against that endpoint; the last error is returned once all candidates
    /// have failed.
    #[instrument(skip(self, op))]
    pub async fn with_failover<T, F, Fut>(&self, op_name: &str, op: F) -> Result<T, RpcManagerError>
    where
        F: Fn(Arc<dyn ChainRpc>) -> Fut,
        Fut: Future<Output = Result<T, RpcManagerError>>,
    {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Err(RpcManagerError::NoHealthyEndpoints {
                total: 0,
                unhealthy: 0,
            });
        }

        let mut last_error = None;
        for (attempt, endpoint) in candidates.iter().enumerate() {
            let timer = Timer::new();
            let outcome = tokio::time::timeout(endpoint.timeout, op(endpoint.client.clone())).await;
            timer.observe_duration(&metrics().rpc_latency);

            let err = match outcome {
                Ok(Ok(value)) => {
                    self.record_success(endpoint);
                    if attempt > 0 {
                        metrics().rpc_failovers.inc();
                        info!(
                            op = op_name,
                            url = %endpoint.url,
                            attempt,
                            "Call served by fallback endpoint"
                        );
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => e.with_timeout(endpoint.timeout),
                Err(_) => RpcManagerError::Timeout {
                    endpoint: endpoint.url.clone(),
                    timeout_ms: endpoint.timeout.as_millis() as u64,
                },
            };

            warn!(
                op = op_name,
                url = %endpoint.url,
                provider = %endpoint.provider,
                error = %err,
                "RPC call failed, trying next endpoint"
            );
            self.record_failure(endpoint);
            last_error = Some(err);
        }

        error!(op = op_name, attempts = candidates.len(), "All RPC endpoints exhausted");
        Err(last_error.unwrap_or(RpcManagerError::NoHealthyEndpoints {
            total: self.endpoints.len(),
            unhealthy: self.endpoints.len() - self.healthy_count(),
        }))
    }

    fn record_success(&self, endpoint: &PooledEndpoint) {
        endpoint.consecutive_failures.store(0, Ordering::Relaxed);
        if !endpoint.healthy.swap(true, Ordering::AcqRel) {
            self.emit_health_event(endpoint, HealthStatus::Unhealthy, HealthStatus::Healthy);
        }
    }

    fn record_failure(&self, endpoint: &PooledEndpoint) {
        metrics().rpc_endpoint_failures.inc();
        let failures = endpoint.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.settings.failure_threshold
            && endpoint.healthy.swap(false, Ordering::AcqRel)
        {
            self.emit_health_event(endpoint, HealthStatus::Healthy, HealthStatus::Unhealthy);
        }
    }

    /// Emit health change event
    fn emit_health_event(&self, endpoint: &PooledEndpoint, old_status: HealthStatus, new_status: HealthStatus) {
        let event = HealthChangeEvent {
            url: endpoint.url.clone(),
            provider: endpoint.provider.clone(),
            old_status,
            new_status,
            consecutive_failures: endpoint.consecutive_failures.load(Ordering::Relaxed),
            timestamp: Instant::now(),
        };

        // Best effort send - don't block if no receivers
        let _ = self.health_event_tx.send(event);
        metrics()
            .rpc_healthy_endpoints
            .with_label_values(&[self.id.as_str()])
            .set(self.healthy_count() as i64);

        info!(
            url = %endpoint.url,
            provider = %endpoint.provider,
            old = ?old_status,
            new = ?new_status,
            "Health status changed"
        );
    }

    /// Probe every endpoint once, concurrently
    #[instrument(skip(self))]
    pub async fn probe_all(&self) {
        let probes = self.endpoints.iter().map(|ep| self.probe_endpoint(ep));
        futures::future::join_all(probes).await;
    }

    async fn probe_endpoint(&self, endpoint: &Arc<PooledEndpoint>) {
        let result = tokio::time::timeout(self.settings.probe_timeout, endpoint.client.get_version()).await;
        *endpoint.last_checked_at.write() = Some(Utc::now());

        match result {
            Ok(Ok(version)) => {
                debug!(url = %endpoint.url, version = %version, "Health probe succeeded");
                self.record_success(endpoint);
            }
            Ok(Err(e)) => {
                warn!(url = %endpoint.url, error = %e, "Health probe failed");
                self.record_failure(endpoint);
            }
            Err(_) => {
                warn!(
                    url = %endpoint.url,
                    timeout_ms = self.settings.probe_timeout.as_millis() as u64,
                    "Health probe timed out"
                );
                self.record_failure(endpoint);
            }
        }
    }

    /// Start the background health probe; a second call is a no-op
    ///
    /// The probe holds only a weak reference, so dropping the pool ends it.
    pub fn start_health_checks(self: &Arc<Self>) {
        let mut slot = self.prober.lock();
        if slot.is_some() {
            return;
        }
        let pool: Weak<Self> = Arc::downgrade(self);
        *slot = Some(WorkerHandle::spawn_periodic(
            "rpc-health-probe",
            self.settings.probe_interval,
            move || {
                let pool = pool.clone();
                async move {
                    if let Some(pool) = pool.upgrade() {
                        pool.probe_all().await;
                    }
                }
            },
        ));
    }

    /// Stop the background health probe
    pub async fn stop(&self) {
        let handle = self.prober.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub fn health_checks_running(&self) -> bool {
        self.prober.lock().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RpcPool {
    fn drop(&mut self) {
        // Absent only if never set, which `new` rules out
        let _ = metrics()
            .rpc_healthy_endpoints
            .remove_label_values(&[self.id.as_str()]);
    }
}

impl std::fmt::Debug for RpcPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcPool")
            .field("id", &self.id)
            .field("endpoints", &self.endpoints)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChainRpc for RpcPool {
    fn label(&self) -> String {
        format!("pool({} endpoints)", self.endpoints.len())
    }

    async fn get_version(&self) -> Result<String, RpcManagerError> {
        self.with_failover("get_version", |c| async move { c.get_version().await })
            .await
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcManagerError> {
        self.with_failover("get_latest_blockhash", |c| async move {
            c.get_latest_blockhash().await
        })
        .await
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, RpcManagerError> {
        self.with_failover("get_account", move |c| async move { c.get_account(pubkey).await })
            .await
    }

    async fn get_recent_prioritization_fees(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<u64>, RpcManagerError> {
        self.with_failover("get_recent_prioritization_fees", move |c| async move {
            c.get_recent_prioritization_fees(accounts).await
        })
        .await
    }

    async fn simulate_transaction(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SimulationOutcome, RpcManagerError> {
        self.with_failover("simulate_transaction", move |c| async move {
            c.simulate_transaction(tx).await
        })
        .await
    }
}
