//! Property tests for keyless identity derivation

use proptest::prelude::*;
use std::collections::HashSet;
use teleburn::derivation::{Deriver, DomainTag, InscriptionId, DEFAULT_DOMAIN_TAG};

proptest! {
    #[test]
    fn derived_identity_is_deterministic_and_off_curve(txid in any::<[u8; 32]>(), index in any::<u32>()) {
        let id = InscriptionId::new(txid, index);
        let deriver = Deriver::default();

        let first = deriver.derive(&id).unwrap();
        let second = deriver.derive(&id).unwrap();
        prop_assert_eq!(first, second);
        prop_assert!(!first.is_on_curve());
    }

    #[test]
    fn textual_and_typed_inputs_agree(txid in any::<[u8; 32]>(), index in any::<u32>()) {
        let id = InscriptionId::new(txid, index);
        let text = id.to_string();
        prop_assert_eq!(text.parse::<InscriptionId>().unwrap(), id);

        let deriver = Deriver::default();
        prop_assert_eq!(deriver.derive_str(&text).unwrap(), deriver.derive(&id).unwrap());
    }

    #[test]
    fn index_and_domain_both_separate_outputs(txid in any::<[u8; 32]>(), index in 0u32..u32::MAX) {
        let deriver = Deriver::default();
        let base = deriver.derive(&InscriptionId::new(txid, index)).unwrap();
        let next = deriver.derive(&InscriptionId::new(txid, index + 1)).unwrap();
        prop_assert_ne!(base, next);

        let other_domain = Deriver::new(DomainTag::new("teleburn:solana:ordinals:v2"));
        prop_assert_ne!(base, other_domain.derive(&InscriptionId::new(txid, index)).unwrap());
    }

    #[test]
    fn malformed_references_are_rejected(s in "[0-9a-f]{0,63}i[0-9]{1,3}|[0-9a-f]{64}[^i0-9][0-9]") {
        prop_assert!(s.parse::<InscriptionId>().is_err());
    }
}

#[test]
fn default_deriver_uses_default_domain() {
    assert_eq!(Deriver::default().domain().as_str(), DEFAULT_DOMAIN_TAG);
}

#[test]
fn ten_thousand_references_do_not_collide() {
    let mut txid = [0u8; 32];
    txid[..8].copy_from_slice(b"collide!");
    let ids: Vec<InscriptionId> = (0..10_000u32)
        .map(|i| {
            let mut t = txid;
            t[28..].copy_from_slice(&(i / 100).to_be_bytes());
            InscriptionId::new(t, i % 100)
        })
        .collect();

    let derived = Deriver::default().derive_batch(&ids);
    let unique: HashSet<_> = derived.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(unique.len(), ids.len());
}
