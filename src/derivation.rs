//! Keyless identity derivation for teleburn targets
//!
//! Maps an Ordinals inscription reference (`<txid>i<index>`) to a 32-byte
//! Solana address that lies off the ed25519 curve, so no private key can ever
//! exist for it. Tokens sent there are provably unspendable while remaining
//! publicly linked to the inscription.
//!
//! ## Algorithm
//! 1. `preimage = txid (32B) || index (u32 BE) || domain tag`
//! 2. `candidate = SHA-256(preimage)`
//! 3. while `candidate` is on the curve: `candidate = SHA-256(candidate || 0x00)`
//!
//! The loop is capped at [`MAX_DERIVATION_ROUNDS`]. Roughly 87.5% of random
//! 32-byte strings are off-curve, so the expected round count is ~1.14 and
//! hitting the cap is a protocol anomaly, never a normal outcome.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error};

use crate::metrics::metrics;

/// Upper bound on re-hash rounds before giving up
pub const MAX_DERIVATION_ROUNDS: u32 = 100;

/// Domain separation tag for the current protocol/chain/version
pub const DEFAULT_DOMAIN_TAG: &str = "teleburn:solana:ordinals:v1";

static INSCRIPTION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{64})i([0-9]+)$").expect("static regex"));

/// Derivation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DerivationError {
    /// Input does not match `<64 hex>i<decimal u32>`
    #[error("Malformed inscription reference '{input}': {reason}")]
    MalformedReference { input: String, reason: String },

    /// Every candidate within the round cap landed on the curve
    #[error("Derivation exhausted after {rounds} rounds for {reference}")]
    DerivationExhausted { reference: String, rounds: u32 },
}

impl DerivationError {
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::MalformedReference { .. } => {
                "Provide the inscription id as 64 hex characters, the letter 'i', and the output index (e.g. <txid>i0)"
            }
            Self::DerivationExhausted { .. } => {
                "Report this reference: exhausting the round cap indicates a broken hash or curve implementation"
            }
        }
    }
}

/// External content reference: a Bitcoin transaction id plus output index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InscriptionId {
    txid: [u8; 32],
    index: u32,
}

impl InscriptionId {
    pub fn new(txid: [u8; 32], index: u32) -> Self {
        Self { txid, index }
    }

    pub fn txid(&self) -> &[u8; 32] {
        &self.txid
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl FromStr for InscriptionId {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| DerivationError::MalformedReference {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let caps = INSCRIPTION_ID_RE
            .captures(s)
            .ok_or_else(|| malformed("expected <64 hex>i<index>"))?;

        let mut txid = [0u8; 32];
        hex::decode_to_slice(&caps[1], &mut txid).map_err(|e| malformed(&e.to_string()))?;

        let index = caps[2]
            .parse::<u32>()
            .map_err(|_| malformed("index must fit in an unsigned 32-bit integer"))?;

        Ok(Self { txid, index })
    }
}

impl fmt::Display for InscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}i{}", hex::encode(self.txid), self.index)
    }
}

impl Serialize for InscriptionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InscriptionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Domain-separation tag mixed into every preimage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainTag(String);

impl DomainTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DomainTag {
    fn default() -> Self {
        Self(DEFAULT_DOMAIN_TAG.to_string())
    }
}

/// Off-curve, keyless 32-byte identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DerivedIdentity(Pubkey);

impl DerivedIdentity {
    pub fn pubkey(&self) -> Pubkey {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Always false for values produced by [`derive`]
    pub fn is_on_curve(&self) -> bool {
        self.0.is_on_curve()
    }
}

impl fmt::Display for DerivedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Refuses on-curve keys, which could have a private key
impl<'de> Deserialize<'de> for DerivedIdentity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = Pubkey::deserialize(deserializer)?;
        if key.is_on_curve() {
            return Err(serde::de::Error::custom(format!(
                "{key} lies on the ed25519 curve and cannot be a keyless identity"
            )));
        }
        Ok(Self(key))
    }
}

impl From<DerivedIdentity> for Pubkey {
    fn from(id: DerivedIdentity) -> Self {
        id.0
    }
}

/// Pure derivation engine bound to one domain tag
#[derive(Debug, Clone, Default)]
pub struct Deriver {
    domain: DomainTag,
}

impl Deriver {
    pub fn new(domain: DomainTag) -> Self {
        Self { domain }
    }

    pub fn domain(&self) -> &DomainTag {
        &self.domain
    }

    /// Derive the keyless identity for one reference
    pub fn derive(&self, reference: &InscriptionId) -> Result<DerivedIdentity, DerivationError> {
        let mut hasher = Sha256::new();
        hasher.update(reference.txid);
        hasher.update(reference.index.to_be_bytes());
        hasher.update(self.domain.as_bytes());
        let mut candidate: [u8; 32] = hasher.finalize().into();

        let mut rounds = 0u32;
        while Pubkey::new_from_array(candidate).is_on_curve() {
            rounds += 1;
            if rounds > MAX_DERIVATION_ROUNDS {
                metrics().derivation_anomalies.inc();
                error!(
                    reference = %reference,
                    domain = %self.domain.as_str(),
                    rounds = MAX_DERIVATION_ROUNDS,
                    "Protocol anomaly: derivation round cap exhausted"
                );
                return Err(DerivationError::DerivationExhausted {
                    reference: reference.to_string(),
                    rounds: MAX_DERIVATION_ROUNDS,
                });
            }
            let mut hasher = Sha256::new();
            hasher.update(candidate);
            hasher.update([0u8]);
            candidate = hasher.finalize().into();
        }

        metrics().derivations_total.inc();
        if rounds > 0 {
            debug!(reference = %reference, rounds, "Derivation needed extra rounds");
        }

        Ok(DerivedIdentity(Pubkey::new_from_array(candidate)))
    }

    /// Parse and derive in one step
    pub fn derive_str(&self, reference: &str) -> Result<DerivedIdentity, DerivationError> {
        self.derive(&reference.parse()?)
    }

    /// Derive many references in parallel; output order matches input order
    pub fn derive_batch(
        &self,
        references: &[InscriptionId],
    ) -> Vec<Result<DerivedIdentity, DerivationError>> {
        references.par_iter().map(|r| self.derive(r)).collect()
    }
}

/// Derive with the default domain tag
pub fn derive(reference: &InscriptionId) -> Result<DerivedIdentity, DerivationError> {
    Deriver::default().derive(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "87e11177b0e184cd7ef0f076fc4de5ddacf509b71d2b1937a01b351965567998i0";

    #[test]
    fn test_parse_valid_reference() {
        let id: InscriptionId = SAMPLE.parse().unwrap();
        assert_eq!(id.index(), 0);
        assert_eq!(id.txid()[0], 0x87);
        assert_eq!(id.to_string(), SAMPLE);
    }

    #[test]
    fn test_parse_normalizes_uppercase_hex() {
        let upper = SAMPLE.to_uppercase().replace('I', "i");
        let id: InscriptionId = upper.parse().unwrap();
        assert_eq!(id.to_string(), SAMPLE);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let cases = [
            "",
            "87e1i0",
            &SAMPLE.replace("i0", "i"),
            &SAMPLE.replace("i0", ":0"),
            &SAMPLE.replace('8', "g"),
            &format!("{}i4294967296", &SAMPLE[..64]),
            &format!("{}i-1", &SAMPLE[..64]),
        ];
        for case in cases {
            let err = case.parse::<InscriptionId>().unwrap_err();
            assert!(matches!(err, DerivationError::MalformedReference { .. }), "{case}");
        }
    }

    #[test]
    fn test_max_index_accepted() {
        let id: InscriptionId = format!("{}i4294967295", &SAMPLE[..64]).parse().unwrap();
        assert_eq!(id.index(), u32::MAX);
    }

    #[test]
    fn test_derive_is_deterministic_and_off_curve() {
        let id: InscriptionId = SAMPLE.parse().unwrap();
        let a = derive(&id).unwrap();
        let b = derive(&id).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_on_curve());
    }

    #[test]
    fn test_domain_tag_changes_identity() {
        let id: InscriptionId = SAMPLE.parse().unwrap();
        let v1 = Deriver::default().derive(&id).unwrap();
        let v2 = Deriver::new(DomainTag::new("teleburn:solana:ordinals:v2"))
            .derive(&id)
            .unwrap();
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_index_changes_identity() {
        let a = Deriver::default().derive(&InscriptionId::new([7u8; 32], 0)).unwrap();
        let b = Deriver::default().derive(&InscriptionId::new([7u8; 32], 1)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_batch_preserves_order() {
        let refs: Vec<InscriptionId> = (0..64).map(|i| InscriptionId::new([3u8; 32], i)).collect();
        let deriver = Deriver::default();
        let batch = deriver.derive_batch(&refs);
        assert_eq!(batch.len(), refs.len());
        for (r, out) in refs.iter().zip(batch) {
            assert_eq!(out.unwrap(), deriver.derive(r).unwrap());
        }
    }

    #[test]
    fn test_serde_as_string() {
        let id: InscriptionId = SAMPLE.parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{SAMPLE}\""));
        let back: InscriptionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_deserialize_rejects_on_curve_key() {
        use solana_sdk::signature::{Keypair, Signer};

        let identity = derive(&SAMPLE.parse().unwrap()).unwrap();
        let json = serde_json::to_string(&identity).unwrap();
        let back: DerivedIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);

        let wallet = serde_json::to_string(&Keypair::new().pubkey()).unwrap();
        let err = serde_json::from_str::<DerivedIdentity>(&wallet).unwrap_err();
        assert!(err.to_string().contains("ed25519 curve"));
    }
}
