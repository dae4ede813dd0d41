//! Transaction build output
//!
//! Holds an unsigned transaction together with what a reviewer needs before
//! anything is signed: a description, the fee estimate, and the signers the
//! external signing stage has to provide.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, transaction::VersionedTransaction};

use crate::derivation::DerivedIdentity;
use crate::preflight::SizeCheck;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::tx_builder::fees::FeeEstimate;
use crate::types::ContentHash;

/// Unsigned transaction ready for rehearsal
///
/// `tx.signatures` holds one default placeholder per required signer so the
/// transaction is well-formed for simulation; nothing here has been signed.
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    /// Operation name (`seal`, `retire`, `update_pointer`)
    pub operation: &'static str,
    pub description: String,
    pub tx: VersionedTransaction,
    pub fee: FeeEstimate,
    pub size: SizeCheck,
    /// Extracted from the message header via the compat layer
    pub required_signers: Vec<Pubkey>,
    /// Keyless target, when the operation involves one
    pub derived_identity: Option<DerivedIdentity>,
    /// Content hash recorded in a seal memo
    pub content_hash: Option<ContentHash>,
    /// Token account a retire draws from
    pub holding_account: Option<Pubkey>,
}

impl BuiltTransaction {
    pub fn new(
        operation: &'static str,
        description: String,
        tx: VersionedTransaction,
        fee: FeeEstimate,
        size: SizeCheck,
    ) -> Self {
        let required_signers = crate::compat::get_required_signers(&tx.message).to_vec();
        Self {
            operation,
            description,
            tx,
            fee,
            size,
            required_signers,
            derived_identity: None,
            content_hash: None,
            holding_account: None,
        }
    }

    pub fn tx_ref(&self) -> &VersionedTransaction {
        &self.tx
    }

    pub fn required_signers(&self) -> &[Pubkey] {
        &self.required_signers
    }

    pub fn compute_unit_limit(&self) -> u32 {
        self.fee.compute_unit_limit
    }

    /// Wire bytes with placeholder signatures, base64 encoded for the signing stage
    pub fn encode_base64(&self) -> Result<String, TransactionBuilderError> {
        let bytes = bincode::serialize(&self.tx).map_err(|e| TransactionBuilderError::Compile(e.to_string()))?;
        Ok(BASE64.encode(bytes))
    }

    /// Review summary plus the encoded unsigned transaction
    pub fn summary(&self) -> BuildSummary {
        BuildSummary {
            operation: self.operation,
            description: self.description.clone(),
            fee_lamports: self.fee.total_lamports,
            compute_unit_limit: self.fee.compute_unit_limit,
            compute_unit_price: self.fee.quote.price_micro_lamports,
            size_bytes: self.size.size_bytes,
            required_signers: self.required_signers.iter().map(|s| s.to_string()).collect(),
            unsigned_transaction: self.encode_base64().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSummary {
    pub operation: &'static str,
    pub description: String,
    pub fee_lamports: u64,
    pub compute_unit_limit: u32,
    pub compute_unit_price: u64,
    pub size_bytes: usize,
    pub required_signers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsigned_transaction: Option<String>,
}
