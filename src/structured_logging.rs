//! Structured logging for rehearsal pipeline events

use crate::observability::CorrelationId;

/// Emits one event per pipeline stage, tagged with the rehearsal's correlation id
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: CorrelationId,
}

impl StructuredLogger {
    pub fn new(context_id: CorrelationId) -> Self {
        Self { context_id }
    }

    pub fn context_id(&self) -> &CorrelationId {
        &self.context_id
    }

    pub fn log_rehearsal_started(&self, mint: &str, inscription: &str, steps: usize) {
        tracing::info!(
            context_id = %self.context_id,
            mint = %mint,
            inscription = %inscription,
            steps = %steps,
            "Rehearsal started"
        );
    }

    pub fn log_step_built(&self, step: &str, size_bytes: usize, fee_lamports: u64) {
        tracing::debug!(
            context_id = %self.context_id,
            step = %step,
            size_bytes = %size_bytes,
            fee_lamports = %fee_lamports,
            "Step built"
        );
    }

    pub fn log_step_build_failed(&self, step: &str, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            step = %step,
            error = %error,
            "Step failed to build"
        );
    }

    pub fn log_step_simulated(&self, step: &str, success: bool, units: Option<u64>, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            step = %step,
            success = %success,
            units = ?units,
            latency_ms = %latency_ms,
            "Step simulated"
        );
    }

    pub fn log_rehearsal_finished(&self, success: bool, total_fee_lamports: u64, errors: usize) {
        if success {
            tracing::info!(
                context_id = %self.context_id,
                total_fee_lamports = %total_fee_lamports,
                "Rehearsal passed"
            );
        } else {
            tracing::warn!(
                context_id = %self.context_id,
                total_fee_lamports = %total_fee_lamports,
                errors = %errors,
                "Rehearsal failed"
            );
        }
    }
}
