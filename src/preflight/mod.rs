//! Preflight Validators
//!
//! Independent checks run before anything is signed: frozen-state of the
//! holding account, serialized size, and compute usage. Each returns a
//! structured result; only the `assert_*` wrappers turn a negative result
//! into an error.

pub mod compute;
pub mod errors;
pub mod frozen;
pub mod size;

pub use compute::{assert_compute_budget, check_compute_budget, ComputeCheck, MAX_COMPUTE_UNITS};
pub use errors::PreflightError;
pub use frozen::{
    assert_not_frozen, check_frozen, fetch_mint, fetch_token_account, FrozenCheck, TokenProgram,
    TOKEN_2022_PROGRAM_ID,
};
pub use size::{
    assert_message_size, check_message_size, classify_size, SizeCheck, SizeStatus, MAX_TRANSACTION_SIZE,
};

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{info, instrument};

use crate::metrics::metrics;
use crate::rpc_manager::{ChainRpc, SimulationOutcome};

/// Combined preflight result, recomputed per attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreflightReport {
    /// `None` when no holding account was checked
    pub frozen: Option<bool>,
    pub size_bytes: usize,
    pub size_valid: bool,
    pub compute_units_estimate: Option<u64>,
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Typed counterparts of `errors`, in the same order
    #[serde(skip)]
    pub violations: Vec<PreflightError>,
    /// `None` when the simulation could not run
    pub simulation: Option<SimulationOutcome>,
}

impl PreflightReport {
    /// Assertion wrapper for construction boundaries
    ///
    /// Returns the first violation as found, so callers can match on it.
    pub fn ensure_valid(&self) -> Result<(), PreflightError> {
        match self.violations.first() {
            Some(err) => Err(err.clone()),
            None if self.valid => Ok(()),
            None => Err(PreflightError::Simulation(self.errors.join("; "))),
        }
    }
}

/// Run all three validators against an unsigned transaction
///
/// A frozen-state query error becomes a warning: the simulation still
/// catches an unusable account.
#[instrument(skip(rpc, tx))]
pub async fn run_preflight(
    rpc: &dyn ChainRpc,
    tx: &VersionedTransaction,
    holding_account: Option<&Pubkey>,
    requested_cu_limit: Option<u32>,
) -> Result<PreflightReport, PreflightError> {
    let mut warnings = Vec::new();
    let mut violations = Vec::new();

    let frozen = match holding_account {
        Some(account) => {
            let check = check_frozen(rpc, account).await;
            if let Some(err) = &check.error {
                warnings.push(format!("Frozen-state check for {account} failed: {err}"));
            } else if check.frozen {
                violations.push(PreflightError::AccountFrozen {
                    account: *account,
                    freeze_authority: check.freeze_authority,
                });
            }
            Some(check.frozen)
        }
        None => None,
    };

    let size = check_message_size(&tx.message)?;
    if !size.is_valid() {
        violations.push(PreflightError::TransactionTooLarge {
            size: size.size_bytes,
            limit: size.limit,
        });
    } else if let Some(msg) = &size.message {
        warnings.push(msg.clone());
    }

    let compute = check_compute_budget(rpc, tx, requested_cu_limit).await;
    warnings.extend(compute.warnings.iter().cloned());
    violations.extend(compute.violation());

    let errors: Vec<String> = violations.iter().map(ToString::to_string).collect();
    let valid = violations.is_empty();
    if !valid {
        metrics().preflight_rejections.inc();
    }
    info!(
        size_bytes = size.size_bytes,
        units = ?compute.units_consumed,
        frozen = ?frozen,
        valid,
        "Preflight complete"
    );

    Ok(PreflightReport {
        frozen,
        size_bytes: size.size_bytes,
        size_valid: size.is_valid(),
        compute_units_estimate: compute.units_consumed,
        valid,
        warnings,
        errors,
        violations,
        simulation: compute.simulation,
    })
}
