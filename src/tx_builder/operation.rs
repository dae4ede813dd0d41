//! Operations the builder can assemble
//!
//! A closed set: seal a mint to an inscription, retire the tokens, or point
//! the mint's metadata at the inscription. Parameters are already typed;
//! string parsing happens before anything reaches this module.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

use crate::derivation::InscriptionId;
use crate::types::ContentHash;

/// Protocol tag written into every memo record
pub const PROTOCOL_TAG: &str = "teleburn";

/// Memo record format version
pub const PROTOCOL_VERSION: u8 = 1;

/// How retired tokens leave the owner's wallet; fixed per deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetireMethod {
    /// Transfer to the derived keyless identity's token account
    #[default]
    Teleburn,
    /// Burn the supply with `burn_checked`
    Burn,
}

impl RetireMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teleburn => "teleburn",
            Self::Burn => "burn",
        }
    }
}

impl fmt::Display for RetireMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attach a provenance record binding a mint to an inscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealParams {
    pub mint: Pubkey,
    /// Signs the memo and pays fees
    pub authority: Pubkey,
    pub inscription: InscriptionId,
    /// Auto-filled from the content resolver when `None`
    pub content_hash: Option<ContentHash>,
}

/// Move the owner's tokens out of reach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetireParams {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub inscription: InscriptionId,
    /// Full holding-account balance when `None`
    pub amount: Option<u64>,
    pub method: RetireMethod,
}

/// Point the mint's metadata at `ord://<inscription>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerParams {
    pub mint: Pubkey,
    pub update_authority: Pubkey,
    pub inscription: InscriptionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Seal(SealParams),
    Retire(RetireParams),
    UpdatePointer(PointerParams),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Seal(_) => "seal",
            Self::Retire(_) => "retire",
            Self::UpdatePointer(_) => "update_pointer",
        }
    }

    pub fn mint(&self) -> &Pubkey {
        match self {
            Self::Seal(p) => &p.mint,
            Self::Retire(p) => &p.mint,
            Self::UpdatePointer(p) => &p.mint,
        }
    }

    pub fn inscription(&self) -> &InscriptionId {
        match self {
            Self::Seal(p) => &p.inscription,
            Self::Retire(p) => &p.inscription,
            Self::UpdatePointer(p) => &p.inscription,
        }
    }

    /// Account paying fees and signing the operation
    pub fn fee_payer(&self) -> &Pubkey {
        match self {
            Self::Seal(p) => &p.authority,
            Self::Retire(p) => &p.owner,
            Self::UpdatePointer(p) => &p.update_authority,
        }
    }
}

/// JSON record carried by the memo instruction
///
/// Field order is the on-chain order; absent fields are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoRecord {
    pub p: String,
    pub v: u8,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inscription: Option<String>,
    pub mint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl MemoRecord {
    fn base(op: &str, mint: &Pubkey) -> Self {
        Self {
            p: PROTOCOL_TAG.to_string(),
            v: PROTOCOL_VERSION,
            op: op.to_string(),
            inscription: None,
            mint: mint.to_string(),
            sha256: None,
            method: None,
            amount: None,
            uri: None,
            to: None,
        }
    }

    pub fn seal(inscription: &InscriptionId, mint: &Pubkey, hash: &ContentHash, to: &Pubkey) -> Self {
        Self {
            inscription: Some(inscription.to_string()),
            sha256: Some(hash.to_hex()),
            to: Some(to.to_string()),
            ..Self::base("seal", mint)
        }
    }

    pub fn retire(
        inscription: &InscriptionId,
        mint: &Pubkey,
        method: RetireMethod,
        amount: u64,
        to: Option<&Pubkey>,
    ) -> Self {
        Self {
            inscription: Some(inscription.to_string()),
            method: Some(method.to_string()),
            // Strings keep u64 amounts exact for JSON consumers
            amount: Some(amount.to_string()),
            to: to.map(|t| t.to_string()),
            ..Self::base("retire", mint)
        }
    }

    pub fn pointer(inscription: &InscriptionId, mint: &Pubkey) -> Self {
        Self {
            inscription: Some(inscription.to_string()),
            uri: Some(format!("ord://{inscription}")),
            ..Self::base("pointer", mint)
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
