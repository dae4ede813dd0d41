//! Error types for transaction assembly
//!
//! Construction either returns a complete unsigned transaction or one of
//! these errors. Policy violations found by the preflight validators arrive
//! wrapped in [`TransactionBuilderError::Preflight`] and keep their
//! remediation hints.

use thiserror::Error;

use crate::content::ContentError;
use crate::derivation::DerivationError;
use crate::preflight::PreflightError;
use crate::rpc_manager::RpcManagerError;

/// Error type for all transaction assembly operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionBuilderError {
    /// Typed parameters are inconsistent with chain state
    ///
    /// For example an empty holding account or a zero retire amount
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Failed to build an instruction for a specific program
    #[error("Instruction build error (program={program}): {reason}")]
    InstructionBuild {
        /// The program the instruction targets
        program: String,
        reason: String,
    },

    /// Instructions are not in compute-limit, compute-price, program order
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Message compilation failed
    #[error("Failed to compile message: {0}")]
    Compile(String),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    /// Content hash auto-fill could not resolve the inscription
    #[error("Content hash auto-fill failed: {0}")]
    Content(#[from] ContentError),

    /// A preflight validator rejected the transaction
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error(transparent)]
    Rpc(#[from] RpcManagerError),

    /// Configuration or validation error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TransactionBuilderError {
    /// Check if this error is potentially retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rpc(e) => e.is_retryable(),
            Self::Content(e) => e.is_retryable(),
            Self::Preflight(PreflightError::Rpc(e)) => e.is_retryable(),

            Self::InvalidParameters(_)
            | Self::InstructionBuild { .. }
            | Self::InvalidInstructionOrder(_)
            | Self::Compile(_)
            | Self::Derivation(_)
            | Self::Preflight(_)
            | Self::Configuration(_) => false,
        }
    }

    /// Frozen account, oversized transaction, or exceeded compute budget
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::Preflight(e) if e.is_policy_violation())
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidParameters(_) => "input",
            Self::InstructionBuild { .. } => "instruction",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::Compile(_) => "internal",
            Self::Derivation(DerivationError::MalformedReference { .. }) => "input",
            Self::Derivation(DerivationError::DerivationExhausted { .. }) => "exhaustion",
            Self::Content(e) => e.category(),
            Self::Preflight(e) => e.category(),
            Self::Rpc(e) => e.category(),
            Self::Configuration(_) => "config",
        }
    }

    /// Human-readable next step, where one exists
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::InvalidParameters(_) => {
                Some("Check the mint, owner and amount against the holding account on chain")
            }
            Self::Derivation(e) => Some(e.remediation()),
            Self::Content(e) => Some(e.remediation()),
            Self::Preflight(e) => e.remediation(),
            Self::Rpc(e) => Some(e.remediation()),
            Self::Configuration(_) => Some("Fix the [fees] or [retire] section of the configuration"),
            Self::InstructionBuild { .. } | Self::InvalidInstructionOrder(_) | Self::Compile(_) => None,
        }
    }
}

// Convenience constructors for common error scenarios
impl TransactionBuilderError {
    /// Create an instruction build error for a specific program
    pub fn instruction_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstructionBuild {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid instruction order error
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    pub fn invalid_parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameters(reason.into())
    }
}
