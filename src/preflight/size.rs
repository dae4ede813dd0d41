//! Serialized transaction size against the packet limit

use serde::Serialize;
use solana_sdk::message::VersionedMessage;
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::transaction::VersionedTransaction;

use super::errors::PreflightError;
use crate::compat::unsigned_transaction;

/// Hard ceiling on a serialized transaction
pub const MAX_TRANSACTION_SIZE: usize = PACKET_DATA_SIZE;

/// Utilization above which a warning is attached
pub const SIZE_WARNING_RATIO: f64 = 0.80;

const SIZE_REMEDIATION: &str =
    "Reduce the instruction count, compress instruction data, or use address lookup tables";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SizeStatus {
    Ok,
    Warning,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeCheck {
    pub size_bytes: usize,
    pub limit: usize,
    pub utilization: f64,
    pub status: SizeStatus,
    pub message: Option<String>,
    pub remediation: Option<&'static str>,
}

impl SizeCheck {
    pub fn is_valid(&self) -> bool {
        self.status != SizeStatus::Invalid
    }
}

/// Classify a byte count: <80% ok, 80-100% warning, >100% invalid
pub fn classify_size(size_bytes: usize) -> SizeCheck {
    let utilization = size_bytes as f64 / MAX_TRANSACTION_SIZE as f64;
    let (status, message, remediation) = if size_bytes > MAX_TRANSACTION_SIZE {
        (
            SizeStatus::Invalid,
            Some(format!(
                "Transaction is {size_bytes} bytes, {} over the {MAX_TRANSACTION_SIZE} byte limit",
                size_bytes - MAX_TRANSACTION_SIZE
            )),
            Some(SIZE_REMEDIATION),
        )
    } else if utilization >= SIZE_WARNING_RATIO {
        (
            SizeStatus::Warning,
            Some(format!(
                "Transaction is {size_bytes} bytes ({:.0}% of the {MAX_TRANSACTION_SIZE} byte limit)",
                utilization * 100.0
            )),
            Some(SIZE_REMEDIATION),
        )
    } else {
        (SizeStatus::Ok, None, None)
    };

    SizeCheck {
        size_bytes,
        limit: MAX_TRANSACTION_SIZE,
        utilization,
        status,
        message,
        remediation,
    }
}

/// Exact wire size of a transaction as given
pub fn serialized_size(tx: &VersionedTransaction) -> Result<usize, PreflightError> {
    bincode::serialized_size(tx)
        .map(|s| s as usize)
        .map_err(|e| PreflightError::Serialization(e.to_string()))
}

/// Wire size once every required signer has signed
///
/// Placeholder signatures occupy the same 64 bytes a real one would.
pub fn signed_wire_size(message: &VersionedMessage) -> Result<usize, PreflightError> {
    serialized_size(&unsigned_transaction(message.clone()))
}

/// Structured size check of an unsigned message
pub fn check_message_size(message: &VersionedMessage) -> Result<SizeCheck, PreflightError> {
    Ok(classify_size(signed_wire_size(message)?))
}

/// Assertion wrapper: fails with `TransactionTooLarge` above the ceiling
pub fn assert_message_size(message: &VersionedMessage) -> Result<SizeCheck, PreflightError> {
    let check = check_message_size(message)?;
    if !check.is_valid() {
        return Err(PreflightError::TransactionTooLarge {
            size: check.size_bytes,
            limit: check.limit,
        });
    }
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;
    use solana_sdk::instruction::Instruction;
    use solana_sdk::message::v0;
    use solana_sdk::pubkey::Pubkey;

    fn message_with_payload(payer: &Pubkey, program: &Pubkey, len: usize) -> VersionedMessage {
        let ix = Instruction::new_with_bytes(*program, &vec![b'x'; len], vec![]);
        VersionedMessage::V0(v0::Message::try_compile(payer, &[ix], &[], Hash::default()).unwrap())
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(classify_size(500).status, SizeStatus::Ok);
        assert_eq!(classify_size(985).status, SizeStatus::Ok);
        assert_eq!(classify_size(986).status, SizeStatus::Warning);
        assert_eq!(classify_size(1232).status, SizeStatus::Warning);
        assert_eq!(classify_size(1233).status, SizeStatus::Invalid);
        assert!(classify_size(1233).remediation.unwrap().contains("lookup tables"));
    }

    #[test]
    fn test_exact_boundary_on_real_message() {
        let payer = Pubkey::new_unique();
        let program = Pubkey::new_unique();

        let probe = signed_wire_size(&message_with_payload(&payer, &program, 300)).unwrap();
        let fit = 300 + MAX_TRANSACTION_SIZE - probe;

        let exact = message_with_payload(&payer, &program, fit);
        let check = assert_message_size(&exact).unwrap();
        assert_eq!(check.size_bytes, 1232);
        assert!(check.is_valid());

        let over = message_with_payload(&payer, &program, fit + 1);
        match assert_message_size(&over) {
            Err(PreflightError::TransactionTooLarge { size, limit }) => {
                assert_eq!(size, 1233);
                assert_eq!(limit, 1232);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_placeholder_signatures_counted() {
        let payer = Pubkey::new_unique();
        let msg = message_with_payload(&payer, &Pubkey::new_unique(), 10);
        let unsigned = VersionedTransaction {
            signatures: vec![],
            message: msg.clone(),
        };
        assert_eq!(
            signed_wire_size(&msg).unwrap(),
            serialized_size(&unsigned).unwrap() + 64
        );
    }
}
