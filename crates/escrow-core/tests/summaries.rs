// crates/escrow-core/tests/summaries.rs
// ============================================================================
// Module: Summary Tests
// Description: Vault, portfolio, and review queue rollups.
// ============================================================================
//! ## Overview
//! Checks read-only rollups used by project, dashboard, and validator views.

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

use common::harness;
use common::proof;
use common::validators;
use common::vault_spec;
use common::verdict;
use escrow_core::PortfolioSummary;
use escrow_core::Timestamp;
use escrow_core::ValidatorId;

#[test]
fn vault_summary_tracks_progress() {
    let h = harness();
    let vault = h.engine.create_vault(vault_spec(40_000, 4)).unwrap();
    h.oracle.push(Ok(verdict(true, 90.0)));
    h.oracle.push(Ok(verdict(true, 81.0)));
    h.engine.submit_proof(&vault.vault_id, 0, &proof("a"), Timestamp::Logical(2)).unwrap();
    h.engine.submit_proof(&vault.vault_id, 1, &proof("b"), Timestamp::Logical(3)).unwrap();
    for validator in validators(3) {
        h.engine.approve_milestone(&vault.vault_id, 0, &validator).unwrap();
    }
    h.engine.release_milestone(&vault.vault_id, 0).unwrap();

    let summary = h.engine.vault_summary(&vault.vault_id).unwrap();
    assert_eq!(summary.milestone_count, 4);
    assert_eq!(summary.released_milestones, 1);
    assert_eq!(summary.released_amount, 10_000);
    assert_eq!(summary.locked_amount, 30_000);
    assert_eq!(summary.average_confidence, Some(86));
    assert_eq!(summary.completion_bps, 2_500);
}

#[test]
fn vault_summary_without_attestations_has_no_average() {
    let h = harness();
    let vault = h.engine.create_vault(vault_spec(100, 2)).unwrap();
    let summary = h.engine.vault_summary(&vault.vault_id).unwrap();
    assert_eq!(summary.average_confidence, None);
    assert_eq!(summary.completion_bps, 0);
}

#[test]
fn portfolio_summary_totals_all_vaults() {
    let h = harness();
    assert_eq!(h.engine.portfolio_summary().unwrap(), PortfolioSummary::default());

    let first = h.engine.create_vault(vault_spec(30_000, 3)).unwrap();
    h.engine.create_vault(vault_spec(5_000, 1)).unwrap();
    h.engine.submit_proof(&first.vault_id, 0, &proof("a"), Timestamp::Logical(2)).unwrap();
    for validator in validators(3) {
        h.engine.approve_milestone(&first.vault_id, 0, &validator).unwrap();
    }
    h.engine.release_milestone(&first.vault_id, 0).unwrap();

    let portfolio = h.engine.portfolio_summary().unwrap();
    assert_eq!(portfolio.vault_count, 2);
    assert_eq!(portfolio.total_committed, 35_000);
    assert_eq!(portfolio.total_released, 10_000);
    assert_eq!(portfolio.total_locked, 25_000);
    assert_eq!(portfolio.released_milestones, 1);
}

#[test]
fn review_queue_lists_submitted_milestones() {
    let h = harness();
    let vault = h.engine.create_vault(vault_spec(30_000, 3)).unwrap();
    h.engine.submit_proof(&vault.vault_id, 0, &proof("a"), Timestamp::Logical(2)).unwrap();
    h.engine.submit_proof(&vault.vault_id, 2, &proof("c"), Timestamp::Logical(3)).unwrap();
    let alice = ValidatorId::new("alice");
    h.engine.approve_milestone(&vault.vault_id, 0, &alice).unwrap();

    let all = h.engine.review_queue(Some(&alice), false).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].milestone_index, 0);
    assert!(all[0].signed_by_validator);
    assert_eq!(all[0].approval_count, 1);
    assert_eq!(all[0].confidence_score, Some(95));
    assert!(!all[1].signed_by_validator);

    let unsigned = h.engine.review_queue(Some(&alice), true).unwrap();
    assert_eq!(unsigned.len(), 1);
    assert_eq!(unsigned[0].milestone_index, 2);

    let anonymous = h.engine.review_queue(None, true).unwrap();
    assert_eq!(anonymous.len(), 2);
}

#[test]
fn review_queue_drops_releasable_milestones() {
    let h = harness();
    let vault = h.engine.create_vault(vault_spec(30_000, 3)).unwrap();
    h.engine.submit_proof(&vault.vault_id, 0, &proof("a"), Timestamp::Logical(2)).unwrap();
    for validator in validators(3) {
        h.engine.approve_milestone(&vault.vault_id, 0, &validator).unwrap();
    }
    assert!(h.engine.review_queue(None, false).unwrap().is_empty());
}
