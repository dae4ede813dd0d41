//! Instruction planning and ordering validation
//!
//! Every transaction has the same layout:
//! 1. `SetComputeUnitLimit`
//! 2. `SetComputeUnitPrice`
//! 3. program instructions (memo, token, associated token account)
//!
//! Token instructions are packed by hand so the same builders work for the
//! classic SPL Token program and Token-2022; both share the base instruction
//! layout.

use solana_sdk::{
    compute_budget::{self, ComputeBudgetInstruction},
    instruction::{AccountMeta, Instruction},
    pubkey,
    pubkey::Pubkey,
};
use spl_token::instruction::TokenInstruction;

use crate::preflight::TokenProgram;
use crate::tx_builder::errors::TransactionBuilderError;

/// SPL Memo program v2
pub const MEMO_PROGRAM_ID: Pubkey = pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

/// Largest memo payload accepted before compilation
pub const MAX_MEMO_BYTES: usize = 566;

const SET_COMPUTE_UNIT_LIMIT_TAG: u8 = 2;
const SET_COMPUTE_UNIT_PRICE_TAG: u8 = 3;

/// Ordered instructions plus the budget they were planned with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPlan {
    pub instructions: Vec<Instruction>,
    pub compute_unit_limit: u32,
    pub compute_unit_price: u64,
}

impl InstructionPlan {
    /// Instructions after the compute-budget prefix
    pub fn program_instructions(&self) -> &[Instruction] {
        &self.instructions[2..]
    }
}

/// Prefix program instructions with the compute-budget pair
pub fn plan_instructions(
    compute_unit_limit: u32,
    compute_unit_price: u64,
    program_ixs: Vec<Instruction>,
) -> Result<InstructionPlan, TransactionBuilderError> {
    if program_ixs.is_empty() {
        return Err(TransactionBuilderError::Configuration(
            "No program instructions to plan".to_string(),
        ));
    }
    if compute_unit_limit == 0 {
        return Err(TransactionBuilderError::Configuration(
            "Compute unit limit must be positive".to_string(),
        ));
    }

    let mut instructions = Vec::with_capacity(program_ixs.len() + 2);
    instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(compute_unit_limit));
    instructions.push(ComputeBudgetInstruction::set_compute_unit_price(compute_unit_price));
    instructions.extend(program_ixs);

    check_instruction_order(&instructions)?;

    Ok(InstructionPlan {
        instructions,
        compute_unit_limit,
        compute_unit_price,
    })
}

fn compute_budget_tag(ix: &Instruction) -> Option<u8> {
    if ix.program_id != compute_budget::id() {
        return None;
    }
    ix.data.first().copied()
}

/// Validate compute-limit, compute-price, then program instructions
///
/// Exactly one of each compute-budget instruction, in that order, and no
/// compute-budget instruction after them.
pub fn check_instruction_order(instructions: &[Instruction]) -> Result<(), TransactionBuilderError> {
    if instructions.len() < 3 {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Expected at least 3 instructions, got {}",
            instructions.len()
        )));
    }

    if compute_budget_tag(&instructions[0]) != Some(SET_COMPUTE_UNIT_LIMIT_TAG) {
        return Err(TransactionBuilderError::invalid_order(format!(
            "First instruction must be SetComputeUnitLimit, got program_id: {}",
            instructions[0].program_id
        )));
    }
    if compute_budget_tag(&instructions[1]) != Some(SET_COMPUTE_UNIT_PRICE_TAG) {
        return Err(TransactionBuilderError::invalid_order(format!(
            "Second instruction must be SetComputeUnitPrice, got program_id: {}",
            instructions[1].program_id
        )));
    }

    for (idx, ix) in instructions.iter().enumerate().skip(2) {
        if ix.program_id == compute_budget::id() {
            return Err(TransactionBuilderError::invalid_order(format!(
                "Compute budget instruction found at position {idx}; only positions 0 and 1 are allowed"
            )));
        }
    }

    Ok(())
}

/// Memo instruction; every listed signer must sign the transaction
pub fn build_memo(data: &[u8], signers: &[&Pubkey]) -> Result<Instruction, TransactionBuilderError> {
    if data.is_empty() || data.len() > MAX_MEMO_BYTES {
        return Err(TransactionBuilderError::instruction_failed(
            "memo",
            format!("memo is {} bytes, expected 1..={MAX_MEMO_BYTES}", data.len()),
        ));
    }
    let metas = signers
        .iter()
        .map(|pk| AccountMeta::new_readonly(**pk, true))
        .collect();
    Ok(Instruction::new_with_bytes(MEMO_PROGRAM_ID, data, metas))
}

/// `TransferChecked` for either token program
pub fn transfer_checked(
    program: TokenProgram,
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Instruction {
    Instruction {
        program_id: program.id(),
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data: TokenInstruction::TransferChecked { amount, decimals }.pack(),
    }
}

/// `BurnChecked` for either token program
pub fn burn_checked(
    program: TokenProgram,
    account: &Pubkey,
    mint: &Pubkey,
    authority: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Instruction {
    Instruction {
        program_id: program.id(),
        accounts: vec![
            AccountMeta::new(*account, false),
            AccountMeta::new(*mint, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data: TokenInstruction::BurnChecked { amount, decimals }.pack(),
    }
}

/// Associated token account of `wallet` under the mint's token program
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey, program: TokenProgram) -> Pubkey {
    spl_associated_token_account::get_associated_token_address_with_program_id(wallet, mint, &program.id())
}

/// Create `wallet`'s associated token account if it does not exist yet
///
/// Works for off-curve wallets, which is how the derived identity receives
/// retired tokens.
pub fn create_associated_account_idempotent(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
    program: TokenProgram,
) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account_idempotent(
        payer,
        wallet,
        mint,
        &program.id(),
    )
}
