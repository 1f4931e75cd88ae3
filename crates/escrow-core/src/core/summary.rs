// crates/escrow-core/src/core/summary.rs
// ============================================================================
// Module: Quorum Escrow Summaries
// Description: Read-only rollups over vault snapshots.
// Purpose: Provide project, portfolio, and validator review views.
// Dependencies: crate::core::{hashing, identifiers, vault}, serde
// ============================================================================

//! ## Overview
//! Summaries are pure functions of vault snapshots. They never mutate state
//! and can be computed from any consistent set of snapshots.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::MilestoneId;
use crate::core::identifiers::ValidatorId;
use crate::core::identifiers::VaultId;
use crate::core::vault::Milestone;
use crate::core::vault::MilestoneStatus;
use crate::core::vault::Vault;

/// Basis points representing 100%.
const FULL_BPS: u64 = 10_000;

// ============================================================================
// SECTION: Vault Summary
// ============================================================================

/// Project-level rollup for a single vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSummary {
    /// Vault identifier.
    pub vault_id: VaultId,
    /// Project name.
    pub name: String,
    /// Total committed amount.
    pub total_amount: u64,
    /// Amount released so far.
    pub released_amount: u64,
    /// Amount still held in escrow.
    pub locked_amount: u64,
    /// Number of milestones.
    pub milestone_count: u32,
    /// Number of released milestones.
    pub released_milestones: u32,
    /// Average confidence over attested milestones, rounded.
    pub average_confidence: Option<u8>,
    /// Released milestones as basis points of all milestones.
    pub completion_bps: u32,
}

impl VaultSummary {
    /// Builds the summary for a vault snapshot.
    #[must_use]
    pub fn from_vault(vault: &Vault) -> Self {
        let milestone_count = count_u32(vault.milestones.len());
        let released_milestones =
            count_u32(vault.milestones.iter().filter(|milestone| milestone.is_released()).count());
        let scores: Vec<u64> = vault
            .milestones
            .iter()
            .filter_map(|milestone| milestone.confidence_score.map(u64::from))
            .collect();
        let average_confidence = if scores.is_empty() {
            None
        } else {
            let count = scores.len() as u64;
            let sum: u64 = scores.iter().sum();
            u8::try_from((sum + count / 2) / count).ok()
        };
        let completion_bps = if milestone_count == 0 {
            0
        } else {
            u32::try_from(u64::from(released_milestones) * FULL_BPS / u64::from(milestone_count))
                .unwrap_or(u32::MAX)
        };
        Self {
            vault_id: vault.vault_id.clone(),
            name: vault.name.clone(),
            total_amount: vault.total_amount,
            released_amount: vault.released_amount,
            locked_amount: vault.locked_amount(),
            milestone_count,
            released_milestones,
            average_confidence,
            completion_bps,
        }
    }
}

// ============================================================================
// SECTION: Portfolio Summary
// ============================================================================

/// Dashboard rollup across all vaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Number of vaults.
    pub vault_count: u64,
    /// Sum of committed totals.
    pub total_committed: u64,
    /// Sum of released amounts.
    pub total_released: u64,
    /// Sum of locked amounts.
    pub total_locked: u64,
    /// Number of released milestones across all vaults.
    pub released_milestones: u64,
}

impl PortfolioSummary {
    /// Builds the portfolio rollup for a set of vault snapshots.
    #[must_use]
    pub fn from_vaults<'a>(vaults: impl IntoIterator<Item = &'a Vault>) -> Self {
        vaults.into_iter().fold(Self::default(), |mut acc, vault| {
            acc.vault_count += 1;
            acc.total_committed = acc.total_committed.saturating_add(vault.total_amount);
            acc.total_released = acc.total_released.saturating_add(vault.released_amount);
            acc.total_locked = acc.total_locked.saturating_add(vault.locked_amount());
            acc.released_milestones +=
                vault.milestones.iter().filter(|milestone| milestone.is_released()).count() as u64;
            acc
        })
    }
}

// ============================================================================
// SECTION: Review Queue
// ============================================================================

/// Submitted milestone awaiting validator co-signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Vault identifier.
    pub vault_id: VaultId,
    /// Vault name.
    pub vault_name: String,
    /// Milestone identifier.
    pub milestone_id: MilestoneId,
    /// Milestone index.
    pub milestone_index: u32,
    /// Claim description.
    pub description: String,
    /// Milestone amount.
    pub amount: u64,
    /// Attested confidence score.
    pub confidence_score: Option<u8>,
    /// Attested proof hash.
    pub proof_hash: Option<HashDigest>,
    /// Distinct approvals so far.
    pub approval_count: usize,
    /// Whether the queried validator already signed.
    pub signed_by_validator: bool,
}

impl ReviewItem {
    /// Returns the review item for a submitted milestone, or `None` for any other status.
    #[must_use]
    pub fn for_milestone(
        vault: &Vault,
        milestone: &Milestone,
        validator: Option<&ValidatorId>,
    ) -> Option<Self> {
        if milestone.status != MilestoneStatus::Submitted {
            return None;
        }
        Some(Self {
            vault_id: vault.vault_id.clone(),
            vault_name: vault.name.clone(),
            milestone_id: milestone.milestone_id.clone(),
            milestone_index: milestone.index,
            description: milestone.description.clone(),
            amount: milestone.amount,
            confidence_score: milestone.confidence_score,
            proof_hash: milestone.proof_hash.clone(),
            approval_count: milestone.approval_count(),
            signed_by_validator: validator
                .is_some_and(|validator| milestone.approvals.contains(validator)),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a collection length into `u32`, saturating on overflow.
fn count_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
