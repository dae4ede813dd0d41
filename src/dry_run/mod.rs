//! Dry-Run Simulation Orchestrator
//!
//! Rehearses a teleburn flow without signing anything. For each step
//! (seal, retire, optional pointer update): build the unsigned transaction,
//! decode it for review, simulate it through the failover pool, and
//! accumulate fees and compute usage. A failing step never stops later
//! steps from being built and reported, but it fails the rehearsal.
//!
//! Only a passing [`DryRunReport`] may be handed to the signing stage;
//! [`DryRunReport::ensure_passed`] is the gate.

pub mod decode;
pub mod report;

pub use decode::{decode_message, program_name, DecodedInstruction};
pub use report::{DryRunError, DryRunReport, Receipt, ReceiptStep, StepReport};

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use crate::derivation::InscriptionId;
use crate::metrics::metrics;
use crate::observability::CorrelationId;
use crate::preflight::run_preflight;
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::{
    FeeTier, Operation, PointerParams, RetireMethod, RetireParams, SealParams, TxBuilder,
};
use crate::types::ContentHash;

/// Logical step of a teleburn flow, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Seal,
    Retire,
    UpdatePointer,
}

impl FlowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seal => "seal",
            Self::Retire => "retire",
            Self::UpdatePointer => "update_pointer",
        }
    }
}

/// Typed inputs for a rehearsal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehearsalRequest {
    pub mint: Pubkey,
    /// Holds the tokens and signs the retire step
    pub owner: Pubkey,
    pub inscription: InscriptionId,
    /// Signs seal and pointer steps; the pointer step runs only when set
    pub update_authority: Option<Pubkey>,
    pub content_hash: Option<ContentHash>,
    pub amount: Option<u64>,
    pub tier: FeeTier,
}

impl RehearsalRequest {
    pub fn new(mint: Pubkey, owner: Pubkey, inscription: InscriptionId) -> Self {
        Self {
            mint,
            owner,
            inscription,
            update_authority: None,
            content_hash: None,
            amount: None,
            tier: FeeTier::default(),
        }
    }

    pub fn steps(&self) -> Vec<FlowStep> {
        let mut steps = vec![FlowStep::Seal, FlowStep::Retire];
        if self.update_authority.is_some() {
            steps.push(FlowStep::UpdatePointer);
        }
        steps
    }

    /// Typed operation for one step
    pub fn operation(&self, step: FlowStep, method: RetireMethod) -> Operation {
        let authority = self.update_authority.unwrap_or(self.owner);
        match step {
            FlowStep::Seal => Operation::Seal(SealParams {
                mint: self.mint,
                authority,
                inscription: self.inscription,
                content_hash: self.content_hash,
            }),
            FlowStep::Retire => Operation::Retire(RetireParams {
                mint: self.mint,
                owner: self.owner,
                inscription: self.inscription,
                amount: self.amount,
                method,
            }),
            FlowStep::UpdatePointer => Operation::UpdatePointer(PointerParams {
                mint: self.mint,
                update_authority: authority,
                inscription: self.inscription,
            }),
        }
    }
}

/// Sequences build, decode and simulate across a flow's steps
pub struct DryRunOrchestrator {
    builder: Arc<TxBuilder>,
    retire_method: RetireMethod,
}

impl DryRunOrchestrator {
    pub fn new(builder: Arc<TxBuilder>, retire_method: RetireMethod) -> Self {
        Self {
            builder,
            retire_method,
        }
    }

    pub fn retire_method(&self) -> RetireMethod {
        self.retire_method
    }

    /// Rehearse every step of the request's flow
    #[instrument(skip(self, request), fields(mint = %request.mint, inscription = %request.inscription))]
    pub async fn rehearse(&self, request: &RehearsalRequest) -> DryRunReport {
        let correlation_id = CorrelationId::new();
        let logger = StructuredLogger::new(correlation_id.clone());
        let steps = request.steps();
        logger.log_rehearsal_started(
            &request.mint.to_string(),
            &request.inscription.to_string(),
            steps.len(),
        );

        let mut reports = Vec::with_capacity(steps.len());
        for step in steps {
            let operation = request.operation(step, self.retire_method);
            reports.push(self.run_step(step, &operation, request.tier, &logger).await);
        }

        let report = DryRunReport::aggregate(
            correlation_id,
            request.mint.to_string(),
            request.inscription.to_string(),
            self.retire_method,
            reports,
        );

        if report.success {
            metrics().rehearsals_passed.inc();
        } else {
            metrics().rehearsals_failed.inc();
        }
        logger.log_rehearsal_finished(report.success, report.total_fee_lamports, report.errors.len());
        report
    }

    async fn run_step(
        &self,
        step: FlowStep,
        operation: &Operation,
        tier: FeeTier,
        logger: &StructuredLogger,
    ) -> StepReport {
        let name = step.as_str();

        let built = match self.builder.build(operation, tier).await {
            Ok(built) => built,
            Err(e) => {
                logger.log_step_build_failed(name, &e.to_string());
                let mut error = e.to_string();
                if let Some(hint) = e.remediation() {
                    error.push_str(&format!(" (remediation: {hint})"));
                }
                return StepReport {
                    name: name.to_string(),
                    description: format!("{name} (not built)"),
                    decoded_instructions: vec![],
                    simulation: None,
                    estimated_fee_lamports: 0,
                    build: None,
                    warnings: vec![],
                    errors: vec![error],
                    success: false,
                };
            }
        };
        logger.log_step_built(name, built.size.size_bytes, built.fee.total_lamports);

        let decoded_instructions = decode_message(&built.tx.message);
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if built.fee.quote.fallback {
            warnings.push(format!(
                "Fee samples unavailable; using fallback price of {} micro-lamports per CU",
                built.fee.quote.price_micro_lamports
            ));
        }

        let started = Instant::now();
        let simulation = match run_preflight(
            self.builder.rpc().as_ref(),
            &built.tx,
            None,
            Some(built.compute_unit_limit()),
        )
        .await
        {
            Ok(preflight) => {
                warnings.extend(preflight.warnings);
                errors.extend(preflight.errors);
                preflight.simulation
            }
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };

        let success = errors.is_empty() && simulation.as_ref().is_some_and(|s| s.is_success());
        logger.log_step_simulated(
            name,
            success,
            simulation.as_ref().and_then(|s| s.units_consumed),
            started.elapsed().as_millis() as u64,
        );

        StepReport {
            name: name.to_string(),
            description: built.description.clone(),
            decoded_instructions,
            simulation,
            estimated_fee_lamports: built.fee.total_lamports,
            build: Some(built.summary()),
            warnings,
            errors,
            success,
        }
    }
}
