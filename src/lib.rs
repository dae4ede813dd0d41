//! Teleburn - keyless identity derivation and dry-run rehearsal for Solana
//!
//! Derives an off-curve Solana address for an Ordinals inscription, then
//! builds and rehearses the transactions that seal a mint to the inscription
//! and retire its tokens. Nothing in this library signs or broadcasts; a
//! passing [`dry_run::DryRunReport`] is the hand-off to the signing stage.

pub mod compat;
pub mod config;
pub mod content;
pub mod derivation;
pub mod dry_run;
pub mod immutability;
pub mod lifecycle;
pub mod metrics;
pub mod observability;
pub mod preflight;
pub mod structured_logging;
pub mod tx_builder;
pub mod types;

// Component modules with non-standard paths (directories with spaces)
#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use derivation::{derive, DerivedIdentity, Deriver, DomainTag, InscriptionId};
pub use solana_sdk::{message::VersionedMessage, pubkey::Pubkey, signature::Signature};
pub use types::ContentHash;
