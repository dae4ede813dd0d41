//! Version-agnostic helpers over `VersionedMessage`
//!
//! Legacy and v0 messages expose the header and static keys through
//! different types. Everything that needs signer information or an unsigned
//! wire form goes through here so both message versions behave the same.

use solana_sdk::{
    message::VersionedMessage, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};

/// Accounts that must sign, in message order. The first is the fee payer.
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let keys = message.static_account_keys();
    let count = get_num_required_signatures(message) as usize;
    &keys[..count.min(keys.len())]
}

#[inline]
#[must_use]
pub fn get_num_required_signatures(message: &VersionedMessage) -> u8 {
    message.header().num_required_signatures
}

/// First required signer, if the message has any
#[must_use]
pub fn fee_payer(message: &VersionedMessage) -> Option<&Pubkey> {
    get_required_signers(message).first()
}

/// Whether `key` is among the required signers
#[must_use]
pub fn requires_signature_from(message: &VersionedMessage, key: &Pubkey) -> bool {
    get_required_signers(message).contains(key)
}

/// Wrap a message with one default signature per required signer
///
/// The result has the exact wire size of the signed transaction and is
/// accepted by simulation with `sig_verify` off. It carries no real
/// signatures.
#[must_use]
pub fn unsigned_transaction(message: VersionedMessage) -> VersionedTransaction {
    let signers = get_num_required_signatures(&message) as usize;
    VersionedTransaction {
        signatures: vec![Signature::default(); signers],
        message,
    }
}
