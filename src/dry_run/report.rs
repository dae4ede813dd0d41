//! Rehearsal report and audit receipt

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::decode::DecodedInstruction;
use crate::observability::CorrelationId;
use crate::rpc_manager::SimulationOutcome;
use crate::tx_builder::{BuildSummary, RetireMethod};
use crate::types::lamports_to_sol;

/// Outcome of one rehearsed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub name: String,
    pub description: String,
    pub decoded_instructions: Vec<DecodedInstruction>,
    /// `None` when the step failed to build or the simulation could not run
    pub simulation: Option<SimulationOutcome>,
    pub estimated_fee_lamports: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSummary>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub success: bool,
}

impl StepReport {
    pub fn compute_units(&self) -> Option<u64> {
        self.simulation.as_ref().and_then(|s| s.units_consumed)
    }

    pub fn simulated_ok(&self) -> bool {
        self.simulation.as_ref().is_some_and(SimulationOutcome::is_success)
    }
}

/// Aggregated rehearsal of a whole flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DryRunReport {
    pub correlation_id: CorrelationId,
    pub mint: String,
    pub inscription: String,
    pub method: RetireMethod,
    pub steps: Vec<StepReport>,
    pub total_fee_lamports: u64,
    pub total_compute_units: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// True only if every step simulated successfully and no step carries an error
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl DryRunReport {
    /// Aggregate step reports; every step's messages are kept, prefixed by step name
    pub fn aggregate(
        correlation_id: CorrelationId,
        mint: String,
        inscription: String,
        method: RetireMethod,
        steps: Vec<StepReport>,
    ) -> Self {
        let total_fee_lamports = steps.iter().map(|s| s.estimated_fee_lamports).sum();
        let total_compute_units = steps.iter().filter_map(StepReport::compute_units).sum();

        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        for step in &steps {
            warnings.extend(step.warnings.iter().map(|w| format!("[{}] {w}", step.name)));
            errors.extend(step.errors.iter().map(|e| format!("[{}] {e}", step.name)));
        }

        let success = !steps.is_empty()
            && errors.is_empty()
            && steps.iter().all(|s| s.success && s.simulated_ok());

        Self {
            correlation_id,
            mint,
            inscription,
            method,
            steps,
            total_fee_lamports,
            total_compute_units,
            warnings,
            errors,
            success,
            timestamp: Utc::now(),
        }
    }

    pub fn total_fee_sol(&self) -> f64 {
        lamports_to_sol(self.total_fee_lamports)
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| !s.success)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Gate for the signing stage: errors unless the rehearsal passed
    pub fn ensure_passed(&self) -> Result<(), DryRunError> {
        if self.success {
            return Ok(());
        }
        Err(DryRunError::RehearsalFailed {
            correlation_id: self.correlation_id.to_string(),
            failed_steps: self.failed_steps().into_iter().map(str::to_string).collect(),
            errors: self.errors.clone(),
        })
    }

    /// Self-contained receipt for audit and download
    pub fn receipt(&self) -> Receipt {
        Receipt {
            mint: self.mint.clone(),
            inscription: self.inscription.clone(),
            method: self.method,
            steps: self
                .steps
                .iter()
                .map(|s| ReceiptStep {
                    name: s.name.clone(),
                    description: s.description.clone(),
                    fee_sol: lamports_to_sol(s.estimated_fee_lamports),
                    success: s.success,
                })
                .collect(),
            total_fee_sol: self.total_fee_sol(),
            warnings: self.warnings.clone(),
            errors: self.errors.clone(),
            success: self.success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptStep {
    pub name: String,
    pub description: String,
    pub fee_sol: f64,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub mint: String,
    pub inscription: String,
    pub method: RetireMethod,
    pub steps: Vec<ReceiptStep>,
    pub total_fee_sol: f64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub success: bool,
}

impl Receipt {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DryRunError {
    #[error("Rehearsal {correlation_id} failed in step(s) {failed_steps:?}: {}", .errors.join("; "))]
    RehearsalFailed {
        correlation_id: String,
        failed_steps: Vec<String>,
        errors: Vec<String>,
    },
}

impl DryRunError {
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::RehearsalFailed { .. } => {
                "Resolve every listed error and rehearse again; nothing may be signed until a rehearsal passes"
            }
        }
    }
}
