//! Program and instruction names from a compiled message
//!
//! Decodes what a reviewer needs to recognise each instruction before
//! signing. Unknown programs and tags are reported as such rather than
//! rejected.

use serde::Serialize;
use solana_sdk::{compute_budget, message::VersionedMessage, pubkey::Pubkey, system_program};
use spl_token::instruction::TokenInstruction;

use crate::preflight::TokenProgram;
use crate::tx_builder::MEMO_PROGRAM_ID;

const MEMO_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedInstruction {
    pub index: usize,
    pub program_id: String,
    pub program: String,
    pub instruction: String,
    pub accounts: usize,
    /// Decoded arguments or a memo preview
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Human-readable name of a well-known program
pub fn program_name(program_id: &Pubkey) -> &'static str {
    if *program_id == compute_budget::id() {
        "Compute Budget"
    } else if *program_id == MEMO_PROGRAM_ID {
        "Memo"
    } else if *program_id == spl_associated_token_account::id() {
        "Associated Token Account"
    } else if *program_id == system_program::id() {
        "System"
    } else {
        match TokenProgram::from_owner(program_id) {
            Some(TokenProgram::Classic) => "SPL Token",
            Some(TokenProgram::Token2022) => "Token-2022",
            None => "Unknown",
        }
    }
}

fn le_u32(data: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(..4)?.try_into().ok()?))
}

fn le_u64(data: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(data.get(..8)?.try_into().ok()?))
}

fn decode_compute_budget(data: &[u8]) -> (String, Option<String>) {
    match data.first() {
        Some(1) => ("RequestHeapFrame".into(), le_u32(&data[1..]).map(|b| format!("bytes={b}"))),
        Some(2) => (
            "SetComputeUnitLimit".into(),
            le_u32(&data[1..]).map(|u| format!("units={u}")),
        ),
        Some(3) => (
            "SetComputeUnitPrice".into(),
            le_u64(&data[1..]).map(|p| format!("micro_lamports={p}")),
        ),
        Some(4) => ("SetLoadedAccountsDataSizeLimit".into(), None),
        Some(tag) => (format!("Unknown({tag})"), None),
        None => ("Unknown".into(), None),
    }
}

fn decode_token(data: &[u8]) -> (String, Option<String>) {
    let Ok(ix) = TokenInstruction::unpack(data) else {
        return (
            data.first().map_or("Unknown".into(), |tag| format!("Unknown({tag})")),
            None,
        );
    };
    match ix {
        TokenInstruction::TransferChecked { amount, decimals } => (
            "TransferChecked".into(),
            Some(format!("amount={amount} decimals={decimals}")),
        ),
        TokenInstruction::BurnChecked { amount, decimals } => (
            "BurnChecked".into(),
            Some(format!("amount={amount} decimals={decimals}")),
        ),
        TokenInstruction::Transfer { amount } => ("Transfer".into(), Some(format!("amount={amount}"))),
        TokenInstruction::Burn { amount } => ("Burn".into(), Some(format!("amount={amount}"))),
        TokenInstruction::CloseAccount => ("CloseAccount".into(), None),
        TokenInstruction::FreezeAccount => ("FreezeAccount".into(), None),
        TokenInstruction::ThawAccount => ("ThawAccount".into(), None),
        other => {
            // Variant name without its fields
            let debug = format!("{other:?}");
            let name = debug
                .split(|c: char| c == ' ' || c == '{' || c == '(')
                .next()
                .unwrap_or("Unknown")
                .to_string();
            (name, None)
        }
    }
}

fn decode_associated_token(data: &[u8]) -> (String, Option<String>) {
    let name = match data.first() {
        None | Some(0) => "Create",
        Some(1) => "CreateIdempotent",
        Some(2) => "RecoverNested",
        Some(_) => "Unknown",
    };
    (name.into(), None)
}

fn decode_system(data: &[u8]) -> (String, Option<String>) {
    let name = match le_u32(data) {
        Some(0) => "CreateAccount",
        Some(1) => "Assign",
        Some(2) => {
            return (
                "Transfer".into(),
                data.get(4..).and_then(le_u64).map(|l| format!("lamports={l}")),
            )
        }
        Some(4) => "AdvanceNonceAccount",
        Some(8) => "Allocate",
        _ => "Unknown",
    };
    (name.into(), None)
}

fn decode_memo(data: &[u8]) -> (String, Option<String>) {
    let preview = match std::str::from_utf8(data) {
        Ok(text) if text.chars().count() > MEMO_PREVIEW_CHARS => {
            let cut: String = text.chars().take(MEMO_PREVIEW_CHARS).collect();
            format!("{cut}…")
        }
        Ok(text) => text.to_string(),
        Err(_) => format!("<{} non-UTF-8 bytes>", data.len()),
    };
    ("Memo".into(), Some(preview))
}

/// Decode every top-level instruction of a message
pub fn decode_message(message: &VersionedMessage) -> Vec<DecodedInstruction> {
    let keys = message.static_account_keys();
    message
        .instructions()
        .iter()
        .enumerate()
        .map(|(index, ix)| {
            let program_id = keys
                .get(ix.program_id_index as usize)
                .copied()
                .unwrap_or_default();
            let program = program_name(&program_id);
            let (instruction, detail) = match program {
                "Compute Budget" => decode_compute_budget(&ix.data),
                "SPL Token" | "Token-2022" => decode_token(&ix.data),
                "Associated Token Account" => decode_associated_token(&ix.data),
                "System" => decode_system(&ix.data),
                "Memo" => decode_memo(&ix.data),
                _ => ("Unknown".to_string(), None),
            };
            DecodedInstruction {
                index,
                program_id: program_id.to_string(),
                program: program.to_string(),
                instruction,
                accounts: ix.accounts.len(),
                detail,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::instructions::{
        build_memo, burn_checked, create_associated_account_idempotent, plan_instructions, transfer_checked,
    };
    use solana_sdk::hash::Hash;
    use solana_sdk::message::v0;

    fn compile(ixs: Vec<solana_sdk::instruction::Instruction>, payer: &Pubkey) -> VersionedMessage {
        let plan = plan_instructions(200_000, 7_500, ixs).unwrap();
        VersionedMessage::V0(v0::Message::try_compile(payer, &plan.instructions, &[], Hash::default()).unwrap())
    }

    #[test]
    fn test_decodes_teleburn_layout() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let target = Pubkey::new_unique();
        let message = compile(
            vec![
                create_associated_account_idempotent(&owner, &target, &mint, TokenProgram::Classic),
                transfer_checked(
                    TokenProgram::Classic,
                    &Pubkey::new_unique(),
                    &mint,
                    &Pubkey::new_unique(),
                    &owner,
                    1,
                    0,
                ),
                build_memo(br#"{"p":"teleburn"}"#, &[&owner]).unwrap(),
            ],
            &owner,
        );

        let decoded = decode_message(&message);
        let names: Vec<(&str, &str)> = decoded
            .iter()
            .map(|d| (d.program.as_str(), d.instruction.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Compute Budget", "SetComputeUnitLimit"),
                ("Compute Budget", "SetComputeUnitPrice"),
                ("Associated Token Account", "CreateIdempotent"),
                ("SPL Token", "TransferChecked"),
                ("Memo", "Memo"),
            ]
        );
        assert_eq!(decoded[0].detail.as_deref(), Some("units=200000"));
        assert_eq!(decoded[1].detail.as_deref(), Some("micro_lamports=7500"));
        assert_eq!(decoded[3].detail.as_deref(), Some("amount=1 decimals=0"));
        assert_eq!(decoded[4].detail.as_deref(), Some(r#"{"p":"teleburn"}"#));
    }

    #[test]
    fn test_decodes_token_2022_burn() {
        let owner = Pubkey::new_unique();
        let message = compile(
            vec![burn_checked(
                TokenProgram::Token2022,
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &owner,
                5,
                2,
            )],
            &owner,
        );
        let decoded = decode_message(&message);
        assert_eq!(decoded[2].program, "Token-2022");
        assert_eq!(decoded[2].instruction, "BurnChecked");
    }

    #[test]
    fn test_long_memo_is_truncated_and_unknown_program_named() {
        assert_eq!(program_name(&Pubkey::new_unique()), "Unknown");
        let (_, detail) = decode_memo(&[b'x'; 200]);
        assert_eq!(detail.unwrap().chars().count(), MEMO_PREVIEW_CHARS + 1);
        let (_, detail) = decode_memo(&[0xff, 0xfe]);
        assert_eq!(detail.unwrap(), "<2 non-UTF-8 bytes>");
    }
}
