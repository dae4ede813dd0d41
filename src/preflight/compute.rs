//! Compute-budget validation from a read-only simulation

use serde::Serialize;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, warn};

use super::errors::PreflightError;
use crate::metrics::metrics;
use crate::rpc_manager::{ChainRpc, SimulationOutcome};

/// Network ceiling on compute units per transaction
pub const MAX_COMPUTE_UNITS: u64 = 1_400_000;

/// Utilization above which a warning is attached
pub const COMPUTE_WARNING_RATIO: f64 = 0.80;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeCheck {
    pub units_consumed: Option<u64>,
    pub requested_limit: Option<u32>,
    pub network_limit: u64,
    pub warnings: Vec<String>,
    /// Set when usage exceeds a limit or the simulation failed
    pub error: Option<String>,
    pub simulation: Option<SimulationOutcome>,
}

impl ComputeCheck {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Highest utilization against either the requested limit or the ceiling
    pub fn utilization(&self) -> Option<f64> {
        let units = self.units_consumed? as f64;
        Some(units / self.effective_limit() as f64)
    }

    /// Tighter of the requested limit and the network ceiling
    pub fn effective_limit(&self) -> u64 {
        self.requested_limit
            .map(u64::from)
            .unwrap_or(self.network_limit)
            .min(self.network_limit)
    }

    /// Typed form of [`ComputeCheck::error`]
    pub fn violation(&self) -> Option<PreflightError> {
        let limit = self.effective_limit();
        match (self.units_consumed, &self.error) {
            (Some(units), _) if units > limit => Some(PreflightError::ComputeBudgetExceeded { units, limit }),
            (_, Some(err)) => Some(PreflightError::Simulation(err.clone())),
            _ => None,
        }
    }
}

/// Compare consumed units against the requested limit and the network ceiling
pub fn assess_units(units: u64, requested_limit: Option<u32>) -> (Vec<String>, Option<String>) {
    let mut warnings = Vec::new();

    if units > MAX_COMPUTE_UNITS {
        return (
            warnings,
            Some(format!("Consumed {units} compute units, above the {MAX_COMPUTE_UNITS} network ceiling")),
        );
    }
    if let Some(limit) = requested_limit {
        let limit = u64::from(limit);
        if units > limit {
            return (
                warnings,
                Some(format!("Consumed {units} compute units, above the requested limit of {limit}")),
            );
        }
        if units as f64 > limit as f64 * COMPUTE_WARNING_RATIO {
            warnings.push(format!(
                "Compute usage {units} is {:.0}% of the requested limit {limit}",
                units as f64 / limit as f64 * 100.0
            ));
        }
    }
    if units as f64 > MAX_COMPUTE_UNITS as f64 * COMPUTE_WARNING_RATIO {
        warnings.push(format!(
            "Compute usage {units} is {:.0}% of the network ceiling",
            units as f64 / MAX_COMPUTE_UNITS as f64 * 100.0
        ));
    }
    (warnings, None)
}

/// Simulate and assess compute usage; failures are reported in the result
pub async fn check_compute_budget(
    rpc: &dyn ChainRpc,
    tx: &VersionedTransaction,
    requested_limit: Option<u32>,
) -> ComputeCheck {
    metrics().simulations_total.inc();
    let outcome = match rpc.simulate_transaction(tx).await {
        Ok(outcome) => outcome,
        Err(e) => {
            metrics().simulation_failures.inc();
            warn!(error = %e, "Compute-budget simulation could not run");
            return ComputeCheck {
                units_consumed: None,
                requested_limit,
                network_limit: MAX_COMPUTE_UNITS,
                warnings: vec![],
                error: Some(format!("Simulation unavailable: {e} (remediation: {})", e.remediation())),
                simulation: None,
            };
        }
    };

    let (warnings, mut error) = match outcome.units_consumed {
        Some(units) => assess_units(units, requested_limit),
        None => (vec!["Simulation did not report compute usage".to_string()], None),
    };
    if let Some(err) = &outcome.err {
        metrics().simulation_failures.inc();
        error.get_or_insert_with(|| match outcome.logs.last() {
            Some(last) => format!("Simulation failed: {err} (last log: {last})"),
            None => format!("Simulation failed: {err}"),
        });
    }

    debug!(
        units = ?outcome.units_consumed,
        requested = ?requested_limit,
        warnings = warnings.len(),
        ok = error.is_none(),
        "Compute-budget check"
    );

    ComputeCheck {
        units_consumed: outcome.units_consumed,
        requested_limit,
        network_limit: MAX_COMPUTE_UNITS,
        warnings,
        error,
        simulation: Some(outcome),
    }
}

/// Assertion wrapper: fails when usage exceeds a limit
pub async fn assert_compute_budget(
    rpc: &dyn ChainRpc,
    tx: &VersionedTransaction,
    requested_limit: Option<u32>,
) -> Result<ComputeCheck, PreflightError> {
    let check = check_compute_budget(rpc, tx, requested_limit).await;
    match check.violation() {
        Some(err) => Err(err),
        None => Ok(check),
    }
}
