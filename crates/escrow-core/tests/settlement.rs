// crates/escrow-core/tests/settlement.rs
// ============================================================================
// Module: Settlement Dispatcher Tests
// Description: Idempotent release, retries, and deadline handling.
// ============================================================================
//! ## Overview
//! Ensures a milestone's funds move at most once regardless of retries,
//! transient ledger failures, deadline expiry, or concurrent releasers.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]
#![allow(dead_code, reason = "Common module may have unused helpers.")]

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::Harness;
use common::RecordingLedger;
use common::ScriptedOracle;
use common::harness;
use common::harness_with;
use common::proof;
use common::validators;
use common::vault_spec;
use escrow_core::EngineConfig;
use escrow_core::EscrowError;
use escrow_core::MilestoneStatus;
use escrow_core::SettlementDispatcher;
use escrow_core::SettlementKey;
use escrow_core::Timestamp;
use escrow_core::VaultId;

fn releasable(h: &Harness) -> VaultId {
    let vault = h.engine.create_vault(vault_spec(30_000, 3)).expect("create");
    h.engine.submit_proof(&vault.vault_id, 0, &proof("done"), Timestamp::Logical(2)).unwrap();
    for validator in validators(3) {
        h.engine.approve_milestone(&vault.vault_id, 0, &validator).unwrap();
    }
    vault.vault_id
}

#[test]
fn release_before_quorum_is_invalid_state() {
    let h = harness();
    let vault = h.engine.create_vault(vault_spec(30_000, 3)).expect("create");
    h.engine.submit_proof(&vault.vault_id, 0, &proof("done"), Timestamp::Logical(2)).unwrap();
    let err = h.engine.release_milestone(&vault.vault_id, 0).unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
    assert!(h.ledger.releases().is_empty());
    assert_eq!(h.engine.vault_state(&vault.vault_id).unwrap().released_amount, 0);
}

#[test]
fn transient_ledger_failure_then_retry_transfers_once() {
    let h = harness();
    let vault_id = releasable(&h);
    h.ledger.fail_releases(1);

    let err = h.engine.release_milestone(&vault_id, 0).unwrap_err();
    assert_eq!(err.kind(), "ledger_failure");
    assert!(err.is_retryable());
    let state = h.engine.vault_state(&vault_id).unwrap();
    assert_eq!(state.milestones[0].status, MilestoneStatus::Releasable);
    assert_eq!(state.released_amount, 0);

    let receipt = h.engine.release_milestone(&vault_id, 0).expect("retry");
    assert_eq!(h.ledger.releases().len(), 1);
    assert_eq!(h.engine.vault_state(&vault_id).unwrap().released_amount, receipt.amount);
}

#[test]
fn ledger_deadline_expiry_converges_on_late_receipt() {
    let config = EngineConfig {
        ledger_timeout: Some(Duration::from_millis(50)),
        ..EngineConfig::default()
    };
    let h = harness_with(config, ScriptedOracle::accepting(95.0));
    let vault_id = releasable(&h);
    h.ledger.set_delay(Duration::from_millis(200));

    let err = h.engine.release_milestone(&vault_id, 0).unwrap_err();
    assert!(matches!(err, EscrowError::LedgerFailure(ref message) if message.contains("deadline")));
    assert_eq!(h.engine.vault_state(&vault_id).unwrap().released_amount, 0);

    thread::sleep(Duration::from_millis(400));
    let receipt = h.engine.release_milestone(&vault_id, 0).expect("retry");
    assert_eq!(h.ledger.releases().len(), 1);
    assert_eq!(receipt.reference.as_str(), "TX_1");
    assert_eq!(h.engine.vault_state(&vault_id).unwrap().released_amount, 10_000);
}

#[test]
fn retry_during_abandoned_transfer_never_transfers_twice() {
    let config = EngineConfig {
        ledger_timeout: Some(Duration::from_millis(50)),
        ..EngineConfig::default()
    };
    let h = harness_with(config, ScriptedOracle::accepting(95.0));
    let vault_id = releasable(&h);
    h.ledger.set_delay(Duration::from_millis(300));

    let err = h.engine.release_milestone(&vault_id, 0).unwrap_err();
    assert!(matches!(err, EscrowError::LedgerFailure(ref message) if message.contains("deadline")));
    let retried = h.engine.release_milestone(&vault_id, 0).unwrap_err();
    assert!(
        matches!(retried, EscrowError::LedgerFailure(ref message) if message.contains("in flight"))
    );
    assert!(retried.is_retryable());
    assert_eq!(h.engine.vault_state(&vault_id).unwrap().released_amount, 0);

    thread::sleep(Duration::from_millis(600));
    let receipt = h.engine.release_milestone(&vault_id, 0).expect("retry after transfer");
    assert_eq!(receipt.reference.as_str(), "TX_1");
    assert_eq!(h.ledger.releases().len(), 1);
    assert_eq!(h.engine.vault_state(&vault_id).unwrap().released_amount, 10_000);
}

#[test]
fn failed_transfer_clears_in_flight_mark() {
    let ledger = Arc::new(RecordingLedger::default());
    let dispatcher = SettlementDispatcher::new(Arc::clone(&ledger), Some(Duration::from_secs(5)));
    let key = SettlementKey::new(VaultId::new("vault-3"), 1);
    ledger.fail_releases(1);

    let err = dispatcher.release(&key, 400, MilestoneStatus::Releasable).unwrap_err();
    assert!(
        matches!(err, EscrowError::LedgerFailure(ref message) if !message.contains("in flight"))
    );
    let receipt = dispatcher.release(&key, 400, MilestoneStatus::Releasable).unwrap();
    assert_eq!(receipt.reference.as_str(), "TX_1");
    assert_eq!(ledger.releases().len(), 1);
}

#[test]
fn settled_keys_release_their_slots() {
    let ledger = Arc::new(RecordingLedger::default());
    let dispatcher = SettlementDispatcher::new(Arc::clone(&ledger), None);
    for index in 0..4 {
        let key = SettlementKey::new(VaultId::new("vault-1"), index);
        dispatcher.release(&key, 100, MilestoneStatus::Releasable).unwrap();
        dispatcher.release(&key, 100, MilestoneStatus::Releasable).unwrap();
    }
    assert_eq!(dispatcher.open_slots().unwrap(), 0);
    assert_eq!(ledger.releases().len(), 4);

    ledger.fail_releases(1);
    let pending = SettlementKey::new(VaultId::new("vault-2"), 0);
    dispatcher.release(&pending, 100, MilestoneStatus::Releasable).unwrap_err();
    assert_eq!(dispatcher.open_slots().unwrap(), 1);
    dispatcher.release(&pending, 100, MilestoneStatus::Releasable).unwrap();
    assert_eq!(dispatcher.open_slots().unwrap(), 0);
}

#[test]
fn concurrent_releases_transfer_exactly_once() {
    let h = Arc::new(harness());
    let vault_id = releasable(&h);
    h.ledger.set_delay(Duration::from_millis(20));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            let vault_id = vault_id.clone();
            thread::spawn(move || h.engine.release_milestone(&vault_id, 0))
        })
        .collect();
    let receipts: Vec<_> =
        handles.into_iter().map(|handle| handle.join().unwrap().expect("release")).collect();

    assert_eq!(h.ledger.releases().len(), 1);
    assert!(receipts.iter().all(|receipt| receipt == &receipts[0]));
    let state = h.engine.vault_state(&vault_id).unwrap();
    assert_eq!(state.released_amount, 10_000);
    state.check_invariants().unwrap();
}

#[test]
fn dispatcher_reports_already_released() {
    let dispatcher = SettlementDispatcher::new(Arc::new(RecordingLedger::default()), None);
    let key = SettlementKey::new(VaultId::new("vault-1"), 0);
    let err = dispatcher.release(&key, 100, MilestoneStatus::Released).unwrap_err();
    assert_eq!(
        err,
        EscrowError::AlreadyReleased {
            vault_id: VaultId::new("vault-1"),
            index: 0,
        }
    );
    assert!(!err.is_retryable());
}

#[test]
fn dispatcher_returns_cached_receipt_without_second_transfer() {
    let ledger = Arc::new(RecordingLedger::default());
    let dispatcher = SettlementDispatcher::new(Arc::clone(&ledger), None);
    let key = SettlementKey::new(VaultId::new("vault-1"), 2);

    let first = dispatcher.release(&key, 700, MilestoneStatus::Releasable).unwrap();
    let second = dispatcher.release(&key, 700, MilestoneStatus::Releasable).unwrap();
    assert_eq!(first, second);
    assert_eq!(ledger.releases().len(), 1);
    assert_eq!(ledger.releases()[0].idempotency_key, key.idempotency_key().unwrap());
    assert_eq!(dispatcher.cached_receipt(&key).unwrap(), Some(first));
}

#[test]
fn idempotency_key_is_deterministic_per_milestone() {
    let a = SettlementKey::new(VaultId::new("vault-1"), 0).idempotency_key().unwrap();
    let b = SettlementKey::new(VaultId::new("vault-1"), 0).idempotency_key().unwrap();
    let c = SettlementKey::new(VaultId::new("vault-1"), 1).idempotency_key().unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}
