//! Test Utilities Module
//!
//! In-memory stand-ins for the chain and for content sources, plus SPL
//! account fixtures, so preflight, assembly and rehearsal can be exercised
//! without a network.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use solana_sdk::{account::Account, hash::Hash, pubkey::Pubkey, transaction::VersionedTransaction};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::content::{ContentSource, FetchedContent, SourceError};
use crate::derivation::InscriptionId;
use crate::rpc_manager::{ChainRpc, RpcManagerError, SimulationOutcome};

/// Compute units reported by a default successful simulation
pub const MOCK_UNITS_CONSUMED: u64 = 42_000;

/// Mock chain endpoint
///
/// Deterministic: the blockhash is derived from the label, accounts and fee
/// samples are whatever the test installs, simulations pass unless an
/// outcome is queued.
pub struct MockChainRpc {
    label: String,
    failing: AtomicBool,
    fees_failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    version_calls: AtomicUsize,
    simulations: Mutex<Vec<VersionedTransaction>>,
    accounts: Mutex<HashMap<Pubkey, Account>>,
    fees: Mutex<Vec<u64>>,
    outcomes: Mutex<VecDeque<SimulationOutcome>>,
}

impl MockChainRpc {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            failing: AtomicBool::new(false),
            fees_failing: AtomicBool::new(false),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
            version_calls: AtomicUsize::new(0),
            simulations: Mutex::new(Vec::new()),
            accounts: Mutex::new(HashMap::new()),
            fees: Mutex::new(Vec::new()),
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Every call (including probes) fails with a transport error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Only prioritization-fee sampling fails
    pub fn set_fees_failing(&self, failing: bool) {
        self.fees_failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every call, e.g. to exercise timeouts
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn set_account(&self, pubkey: Pubkey, account: Account) {
        self.accounts.lock().insert(pubkey, account);
    }

    pub fn set_fees(&self, fees: Vec<u64>) {
        *self.fees.lock() = fees;
    }

    /// Queue the outcome of the next simulation
    pub fn push_simulation(&self, outcome: SimulationOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Number of non-probe calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    /// Transactions passed to `simulate_transaction`, in order
    pub fn simulated(&self) -> Vec<VersionedTransaction> {
        self.simulations.lock().clone()
    }

    pub fn blockhash(&self) -> Hash {
        Hash::new_from_array(Sha256::digest(self.label.as_bytes()).into())
    }

    async fn enter(&self) -> Result<(), RpcManagerError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RpcManagerError::Transport {
                endpoint: self.label.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn get_version(&self) -> Result<String, RpcManagerError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        Ok("2.3.0".to_string())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcManagerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        Ok(self.blockhash())
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, RpcManagerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        Ok(self.accounts.lock().get(pubkey).cloned())
    }

    async fn get_recent_prioritization_fees(
        &self,
        _accounts: &[Pubkey],
    ) -> Result<Vec<u64>, RpcManagerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        if self.fees_failing.load(Ordering::SeqCst) {
            return Err(RpcManagerError::RpcResponse {
                endpoint: self.label.clone(),
                message: "method not supported".to_string(),
                code: Some(-32601),
            });
        }
        Ok(self.fees.lock().clone())
    }

    async fn simulate_transaction(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SimulationOutcome, RpcManagerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        self.simulations.lock().push(tx.clone());
        let queued = self.outcomes.lock().pop_front();
        Ok(queued.unwrap_or_else(|| SimulationOutcome {
            err: None,
            logs: vec!["Program log: mock simulation".to_string()],
            units_consumed: Some(MOCK_UNITS_CONSUMED),
        }))
    }
}

/// In-memory content source with call counting
pub struct MockContentSource {
    name: String,
    priority: u32,
    content: Mutex<HashMap<InscriptionId, Bytes>>,
    failure: Mutex<Option<SourceError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockContentSource {
    pub fn new(name: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            content: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Install (or replace) the bytes served for `id`
    pub fn put(&self, id: InscriptionId, bytes: Vec<u8>) {
        self.content.lock().insert(id, Bytes::from(bytes));
    }

    /// Fail every fetch with `error`
    pub fn fail_with(&self, error: SourceError) {
        *self.failure.lock() = Some(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn fetch(&self, id: &InscriptionId, max_bytes: u64) -> Result<FetchedContent, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        let bytes = self
            .content
            .lock()
            .get(id)
            .cloned()
            .ok_or(SourceError::NotFound)?;
        if bytes.len() as u64 > max_bytes {
            return Err(SourceError::TooLarge {
                observed: bytes.len() as u64,
                limit: max_bytes,
            });
        }
        Ok(FetchedContent {
            bytes,
            content_type: Some("text/plain".to_string()),
        })
    }
}

/// SPL account fixtures in the on-chain byte layout
pub mod fixtures {
    use solana_sdk::{account::Account, pubkey::Pubkey};
    use spl_token::solana_program::program_option::COption;
    use spl_token::solana_program::program_pack::Pack;
    use spl_token::state::{Account as TokenAccount, AccountState, Mint};

    /// Mint account owned by `token_program`
    pub fn mint_account(
        decimals: u8,
        supply: u64,
        freeze_authority: Option<Pubkey>,
        token_program: Pubkey,
    ) -> Account {
        let mint = Mint {
            mint_authority: COption::None,
            supply,
            decimals,
            is_initialized: true,
            freeze_authority: freeze_authority.map_or(COption::None, COption::Some),
        };
        let mut data = vec![0u8; Mint::LEN];
        Mint::pack(mint, &mut data).expect("pack mint");
        Account {
            lamports: 1_461_600,
            data,
            owner: token_program,
            executable: false,
            rent_epoch: 0,
        }
    }

    /// Token holding account owned by `token_program`
    pub fn token_account(
        mint: Pubkey,
        owner: Pubkey,
        amount: u64,
        frozen: bool,
        token_program: Pubkey,
    ) -> Account {
        let account = TokenAccount {
            mint,
            owner,
            amount,
            delegate: COption::None,
            state: if frozen {
                AccountState::Frozen
            } else {
                AccountState::Initialized
            },
            is_native: COption::None,
            delegated_amount: 0,
            close_authority: COption::None,
        };
        let mut data = vec![0u8; TokenAccount::LEN];
        TokenAccount::pack(account, &mut data).expect("pack token account");
        Account {
            lamports: 2_039_280,
            data,
            owner: token_program,
            executable: false,
            rent_epoch: 0,
        }
    }
}
