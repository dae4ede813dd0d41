//! Frozen-state check for SPL token holding accounts
//!
//! Reads classic SPL Token and Token-2022 accounts. Token-2022 accounts may
//! carry extensions after the base layout, so only the base prefix is
//! unpacked.

use serde::Serialize;
use solana_sdk::{pubkey, pubkey::Pubkey};
use spl_token::solana_program::program_pack::{IsInitialized, Pack};
use spl_token::state::{Account as TokenAccount, AccountState, Mint};
use tracing::{debug, warn};

use super::errors::PreflightError;
use crate::rpc_manager::ChainRpc;

pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

/// Token program owning a mint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenProgram {
    Classic,
    Token2022,
}

impl TokenProgram {
    pub fn id(&self) -> Pubkey {
        match self {
            Self::Classic => spl_token::id(),
            Self::Token2022 => TOKEN_2022_PROGRAM_ID,
        }
    }

    pub fn from_owner(owner: &Pubkey) -> Option<Self> {
        if *owner == spl_token::id() {
            Some(Self::Classic)
        } else if *owner == TOKEN_2022_PROGRAM_ID {
            Some(Self::Token2022)
        } else {
            None
        }
    }
}

fn unpack_prefix<T: Pack + IsInitialized>(
    account: &Pubkey,
    owner: &Pubkey,
    data: &[u8],
) -> Result<T, PreflightError> {
    let invalid = |reason: String| PreflightError::InvalidAccount {
        account: *account,
        reason,
    };
    if TokenProgram::from_owner(owner).is_none() {
        return Err(invalid(format!("owned by {owner}, not a token program")));
    }
    if data.len() < T::LEN {
        return Err(invalid(format!("data is {} bytes, expected at least {}", data.len(), T::LEN)));
    }
    let state = T::unpack_from_slice(&data[..T::LEN]).map_err(|e| invalid(e.to_string()))?;
    if !state.is_initialized() {
        return Err(invalid("not initialized".to_string()));
    }
    Ok(state)
}

/// Fetch and decode a token holding account
pub async fn fetch_token_account(
    rpc: &dyn ChainRpc,
    account: &Pubkey,
) -> Result<(TokenAccount, TokenProgram), PreflightError> {
    let raw = rpc
        .get_account(account)
        .await?
        .ok_or(PreflightError::AccountNotFound { account: *account })?;
    let state = unpack_prefix::<TokenAccount>(account, &raw.owner, &raw.data)?;
    let program = TokenProgram::from_owner(&raw.owner).unwrap_or(TokenProgram::Classic);
    Ok((state, program))
}

/// Fetch and decode a mint
pub async fn fetch_mint(rpc: &dyn ChainRpc, mint: &Pubkey) -> Result<(Mint, TokenProgram), PreflightError> {
    let raw = rpc
        .get_account(mint)
        .await?
        .ok_or(PreflightError::AccountNotFound { account: *mint })?;
    let state = unpack_prefix::<Mint>(mint, &raw.owner, &raw.data)?;
    let program = TokenProgram::from_owner(&raw.owner).unwrap_or(TokenProgram::Classic);
    Ok((state, program))
}

/// Outcome of a frozen-state query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrozenCheck {
    pub account: Pubkey,
    pub frozen: bool,
    pub freeze_authority: Option<Pubkey>,
    /// Set when the query itself failed; `frozen` is then false
    pub error: Option<String>,
}

impl FrozenCheck {
    pub fn query_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Query whether a holding account is frozen; query errors are reported, not returned
pub async fn check_frozen(rpc: &dyn ChainRpc, account: &Pubkey) -> FrozenCheck {
    match query_frozen(rpc, account).await {
        Ok(check) => check,
        Err(e) => {
            warn!(account = %account, error = %e, "Frozen-state query failed");
            FrozenCheck {
                account: *account,
                frozen: false,
                freeze_authority: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn query_frozen(rpc: &dyn ChainRpc, account: &Pubkey) -> Result<FrozenCheck, PreflightError> {
    let (state, _) = fetch_token_account(rpc, account).await?;
    let frozen = state.state == AccountState::Frozen;

    // Authority lookup is informational; a missing mint does not hide the state
    let freeze_authority: Option<Pubkey> = match fetch_mint(rpc, &state.mint).await {
        Ok((mint, _)) => mint.freeze_authority.into(),
        Err(e) => {
            debug!(mint = %state.mint, error = %e, "Could not read freeze authority");
            None
        }
    };

    Ok(FrozenCheck {
        account: *account,
        frozen,
        freeze_authority,
        error: None,
    })
}

/// Assertion wrapper: fails with `AccountFrozen` when the account is frozen
pub async fn assert_not_frozen(rpc: &dyn ChainRpc, account: &Pubkey) -> Result<FrozenCheck, PreflightError> {
    let check = query_frozen(rpc, account).await?;
    if check.frozen {
        return Err(PreflightError::AccountFrozen {
            account: *account,
            freeze_authority: check.freeze_authority,
        });
    }
    Ok(check)
}
