use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::rpc_manager::RpcManagerError;

/// Preflight policy violations and query failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error("Token account {account} is frozen (freeze authority: {})", .freeze_authority.map(|a| a.to_string()).unwrap_or_else(|| "none".to_string()))]
    AccountFrozen {
        account: Pubkey,
        freeze_authority: Option<Pubkey>,
    },

    #[error("Account {account} not found")]
    AccountNotFound { account: Pubkey },

    #[error("Account {account} is not a valid token account: {reason}")]
    InvalidAccount { account: Pubkey, reason: String },

    #[error("Transaction is {size} bytes, above the {limit} byte packet limit")]
    TransactionTooLarge { size: usize, limit: usize },

    #[error("Simulation consumed {units} compute units, above the {limit} unit limit")]
    ComputeBudgetExceeded { units: u64, limit: u64 },

    #[error("Failed to serialize transaction: {0}")]
    Serialization(String),

    /// Simulation could not run or reported an error; the text says which
    #[error("{0}")]
    Simulation(String),

    #[error(transparent)]
    Rpc(#[from] RpcManagerError),
}

impl PreflightError {
    /// Policy violations block construction; everything else is a query failure
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            Self::AccountFrozen { .. } | Self::TransactionTooLarge { .. } | Self::ComputeBudgetExceeded { .. }
        )
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::AccountFrozen { .. }
            | Self::TransactionTooLarge { .. }
            | Self::ComputeBudgetExceeded { .. } => "policy_violation",
            Self::AccountNotFound { .. } | Self::InvalidAccount { .. } => "input",
            Self::Serialization(_) | Self::Simulation(_) => "internal",
            Self::Rpc(e) => e.category(),
        }
    }

    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::AccountFrozen { .. } => Some(
                "Ask the mint's freeze authority to thaw the account before retiring the token",
            ),
            Self::AccountNotFound { .. } => {
                Some("Check the mint and owner; the owner must hold the token in its associated token account")
            }
            Self::TransactionTooLarge { .. } => Some(
                "Reduce the instruction count, compress instruction data, or use address lookup tables",
            ),
            Self::ComputeBudgetExceeded { .. } => {
                Some("Split the operation into several transactions or simplify the instructions")
            }
            Self::Rpc(e) => Some(e.remediation()),
            Self::InvalidAccount { .. } | Self::Serialization(_) | Self::Simulation(_) => None,
        }
    }
}
