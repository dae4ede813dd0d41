//! RPC Manager Module
//!
//! Prioritized, health-checked routing of chain reads. Everything downstream
//! talks to the chain through [`ChainRpc`]; the pool implements the same trait
//! so callers cannot bypass failover.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::RpcSimulateTransactionConfig;
use solana_sdk::{account::Account, hash::Hash, pubkey::Pubkey, transaction::VersionedTransaction};

// Submodules
pub mod rpc_config;
pub mod rpc_errors;
pub mod rpc_pool;

// Re-exports for convenience
pub use rpc_config::{RpcEndpointConfig, RpcManagerConfig};
pub use rpc_errors::RpcManagerError;
pub use rpc_pool::{EndpointDescriptor, FailoverSettings, HealthChangeEvent, HealthStatus, RpcPool};

/// Result of a read-only transaction simulation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    /// Transaction error rendered for humans; `None` means the simulation passed
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationOutcome {
    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }
}

/// Chain reads used by preflight, assembly and rehearsal
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Endpoint label for logs and errors
    fn label(&self) -> String;

    /// Lightweight liveness call used by health probes
    async fn get_version(&self) -> Result<String, RpcManagerError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcManagerError>;

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, RpcManagerError>;

    /// Recent per-slot prioritization fees (micro-lamports per CU)
    async fn get_recent_prioritization_fees(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<u64>, RpcManagerError>;

    /// Simulate without signature verification, replacing the blockhash
    async fn simulate_transaction(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SimulationOutcome, RpcManagerError>;
}

#[async_trait]
impl ChainRpc for RpcClient {
    fn label(&self) -> String {
        self.url()
    }

    async fn get_version(&self) -> Result<String, RpcManagerError> {
        RpcClient::get_version(self)
            .await
            .map(|v| v.solana_core)
            .map_err(|e| RpcManagerError::from_client_error(e, &self.url()))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcManagerError> {
        RpcClient::get_latest_blockhash(self)
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.url()))
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, RpcManagerError> {
        self.get_account_with_commitment(pubkey, self.commitment())
            .await
            .map(|r| r.value)
            .map_err(|e| RpcManagerError::from_client_error(e, &self.url()))
    }

    async fn get_recent_prioritization_fees(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<u64>, RpcManagerError> {
        RpcClient::get_recent_prioritization_fees(self, accounts)
            .await
            .map(|fees| fees.into_iter().map(|f| f.prioritization_fee).collect())
            .map_err(|e| RpcManagerError::from_client_error(e, &self.url()))
    }

    async fn simulate_transaction(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SimulationOutcome, RpcManagerError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.commitment()),
            ..Default::default()
        };

        let response = self
            .simulate_transaction_with_config(tx, config)
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.url()))?;

        let result = response.value;
        Ok(SimulationOutcome {
            err: result.err.map(|e| format!("{e:?}")),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
        })
    }
}
