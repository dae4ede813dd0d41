//! Rehearsal aggregation and end-to-end flows over mocked chain and content

use std::sync::Arc;

use super::test_helpers::{inscription, Harness, CONTENT};
use crate::derivation::Deriver;
use crate::dry_run::{DryRunError, DryRunOrchestrator};
use crate::immutability::ImmutabilityTracker;
use crate::rpc_manager::SimulationOutcome;
use crate::test_utils::MOCK_UNITS_CONSUMED;
use crate::tx_builder::RetireMethod;
use crate::types::ContentHash;

fn passing() -> SimulationOutcome {
    SimulationOutcome {
        err: None,
        logs: vec!["Program log: ok".to_string()],
        units_consumed: Some(MOCK_UNITS_CONSUMED),
    }
}

fn failing() -> SimulationOutcome {
    SimulationOutcome {
        err: Some("InstructionError(2, Custom(1))".to_string()),
        logs: vec!["Program log: Error: insufficient funds".to_string()],
        units_consumed: Some(3_000),
    }
}

#[tokio::test]
async fn test_full_flow_passes_and_gates_signing() {
    let h = Harness::new();
    h.install_holding(1);
    let orchestrator = DryRunOrchestrator::new(Arc::clone(&h.builder), RetireMethod::Teleburn);

    let report = orchestrator.rehearse(&h.request()).await;

    assert!(report.success, "errors: {:?}", report.errors);
    assert!(report.ensure_passed().is_ok());
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.steps[0].name, "seal");
    assert_eq!(report.steps[1].name, "retire");
    // Compute limit, compute price, create ATA, transfer, memo
    assert_eq!(report.steps[1].decoded_instructions.len(), 5);
    assert_eq!(report.total_compute_units, 2 * MOCK_UNITS_CONSUMED);
    assert_eq!(
        report.total_fee_lamports,
        report.steps.iter().map(|s| s.estimated_fee_lamports).sum::<u64>()
    );
    assert_eq!(h.primary.simulated().len(), 2);
}

#[tokio::test]
async fn test_second_step_simulation_failure_fails_the_rehearsal() {
    let h = Harness::new();
    h.install_holding(1);
    h.primary.push_simulation(passing());
    h.primary.push_simulation(failing());
    let orchestrator = DryRunOrchestrator::new(Arc::clone(&h.builder), RetireMethod::Teleburn);

    let report = orchestrator.rehearse(&h.request()).await;

    assert!(!report.success);
    assert!(report.steps[0].success);
    assert!(!report.steps[1].success);
    assert!(report.steps.iter().all(|s| !s.decoded_instructions.is_empty()));
    assert!(!report.errors.is_empty());
    assert!(report.errors.iter().all(|e| e.starts_with("[retire]")));
    assert!(report.steps[1].errors[0].contains("last log: Program log: Error: insufficient funds"));
    assert_eq!(report.failed_steps(), vec!["retire"]);

    match report.ensure_passed() {
        Err(DryRunError::RehearsalFailed { failed_steps, .. }) => {
            assert_eq!(failed_steps, vec!["retire".to_string()]);
        }
        other => panic!("expected RehearsalFailed, got {other:?}"),
    }

    let receipt = serde_json::to_value(report.receipt()).unwrap();
    assert_eq!(receipt["success"], false);
    assert_eq!(receipt["steps"][1]["success"], false);
    assert_eq!(receipt["method"], "teleburn");
}

#[tokio::test]
async fn test_step_over_compute_ceiling_fails_even_when_simulation_succeeds() {
    let h = Harness::new();
    h.install_holding(1);
    h.primary.push_simulation(SimulationOutcome {
        err: None,
        logs: vec![],
        units_consumed: Some(1_500_000),
    });
    let orchestrator = DryRunOrchestrator::new(Arc::clone(&h.builder), RetireMethod::Teleburn);

    let report = orchestrator.rehearse(&h.request()).await;

    let seal = &report.steps[0];
    assert!(!seal.success);
    assert_eq!(seal.errors.len(), 1);
    assert!(seal.errors[0].contains("1500000 compute units"));
    assert!(report.steps[1].success);
    assert_eq!(report.failed_steps(), vec!["seal"]);
}

#[tokio::test]
async fn test_unbuildable_step_is_reported_and_later_steps_still_run() {
    let h = Harness::new();
    h.install_holding(1);
    let mut request = h.request();
    // Nothing serves this inscription, so the seal cannot compute its hash
    request.inscription = format!("{}i7", "e".repeat(64)).parse().unwrap();
    let orchestrator = DryRunOrchestrator::new(Arc::clone(&h.builder), RetireMethod::Burn);

    let report = orchestrator.rehearse(&request).await;

    assert!(!report.success);
    let seal = &report.steps[0];
    assert!(seal.simulation.is_none());
    assert!(seal.build.is_none());
    assert!(seal.errors[0].contains("remediation"));
    assert!(report.steps[1].success);
    // Only the retire step reached simulation
    assert_eq!(h.primary.simulated().len(), 1);
}

#[tokio::test]
async fn test_pointer_step_runs_when_update_authority_given() {
    let h = Harness::new();
    h.install_holding(1);
    let mut request = h.request();
    request.update_authority = Some(solana_sdk::pubkey::Pubkey::new_unique());
    request.content_hash = Some(ContentHash::digest(CONTENT));
    let orchestrator = DryRunOrchestrator::new(Arc::clone(&h.builder), RetireMethod::Burn);

    let report = orchestrator.rehearse(&request).await;

    assert!(report.success, "errors: {:?}", report.errors);
    let names: Vec<_> = report.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["seal", "retire", "update_pointer"]);
    // Supplied hash: the resolver was never consulted
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn test_derive_hash_and_detect_altered_content() {
    let h = Harness::new();
    let deriver = Deriver::default();
    let first = deriver.derive(&inscription()).unwrap();
    let second = deriver.derive(&inscription()).unwrap();
    assert_eq!(first, second);
    assert!(!first.is_on_curve());

    let hashed = h.content.compute_content_hash(&inscription()).await.unwrap();
    assert_eq!(hashed.hash, ContentHash::digest(CONTENT));

    let tracker = ImmutabilityTracker::new(Arc::clone(&h.content));
    tracker.snapshot(inscription(), hashed.hash, hashed.source_name);
    assert!(tracker.verify_snapshot(&inscription()).await.unwrap().unchanged);

    h.source.put(inscription(), b"<svg>swapped</svg>".to_vec());
    let result = tracker.verify_snapshot(&inscription()).await.unwrap();
    assert!(!result.unchanged);
    assert_eq!(result.original_hash, ContentHash::digest(CONTENT));
}
