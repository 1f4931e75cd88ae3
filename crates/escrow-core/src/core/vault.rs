// crates/escrow-core/src/core/vault.rs
// ============================================================================
// Module: Quorum Escrow Vault Model
// Description: Vaults, milestones, lifecycle status, and creation specs.
// Purpose: Define the escrow data model and its accounting invariants.
// Dependencies: crate::core::{attestation, hashing, identifiers, settlement, time}, serde
// ============================================================================

//! ## Overview
//! A vault holds a fixed total amount disbursed only through its milestones.
//! Each milestone moves through `pending → submitted → releasable → released`
//! and is never deleted. Amounts are integer minor units.
//!
//! Accounting invariants checked by [`Vault::check_invariants`]:
//! - `released_amount == sum(amount of released milestones)`
//! - `released_amount <= total_amount`
//! - `sum(milestone amounts) == total_amount`

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::attestation::AttestationRecord;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::AuthorityId;
use crate::core::identifiers::MilestoneId;
use crate::core::identifiers::ValidatorId;
use crate::core::identifiers::VaultId;
use crate::core::settlement::SettlementReceipt;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of distinct validator approvals required for release by default.
pub const DEFAULT_QUORUM_THRESHOLD: usize = 3;
/// Maximum number of milestones per vault.
pub const MAX_MILESTONES: u32 = 10;

// ============================================================================
// SECTION: Milestone Status
// ============================================================================

/// Milestone lifecycle status.
///
/// # Invariants
/// - Transitions only move forward one step at a time.
/// - `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    /// Awaiting an accepted proof submission.
    Pending,
    /// Proof attested; collecting validator approvals.
    Submitted,
    /// Quorum reached; awaiting settlement.
    Releasable,
    /// Funds transferred.
    Released,
}

impl MilestoneStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Releasable => "releasable",
            Self::Released => "released",
        }
    }

    /// Returns the only status this status may advance to.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Submitted),
            Self::Submitted => Some(Self::Releasable),
            Self::Releasable => Some(Self::Released),
            Self::Released => None,
        }
    }
}

// ============================================================================
// SECTION: Vault Category
// ============================================================================

/// Impact category of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultCategory {
    /// Schools, training, and learning programs.
    Education,
    /// Clinics and health services.
    Healthcare,
    /// Farming and food security.
    Agriculture,
    /// Water, roads, energy, and civil works.
    Infrastructure,
}

impl VaultCategory {
    /// Returns a stable label for the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Education => "education",
            Self::Healthcare => "healthcare",
            Self::Agriculture => "agriculture",
            Self::Infrastructure => "infrastructure",
        }
    }
}

// ============================================================================
// SECTION: Vault Spec
// ============================================================================

/// Caller input for vault creation.
///
/// # Invariants
/// - Validated by the registry; see [`crate::VaultRegistry::create_vault`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSpec {
    /// Human-readable project name.
    pub name: String,
    /// Project description.
    #[serde(default)]
    pub description: String,
    /// Owning authority (maker).
    pub authority: AuthorityId,
    /// Impact category.
    pub category: VaultCategory,
    /// Project location label.
    #[serde(default)]
    pub location: String,
    /// Total committed amount in minor units.
    pub total_amount: u64,
    /// Number of milestones to split the total into.
    pub milestone_count: u32,
    /// Optional per-milestone descriptions; empty or exactly `milestone_count` long.
    #[serde(default)]
    pub milestone_descriptions: Vec<String>,
    /// Creation time supplied by the caller.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Milestone
// ============================================================================

/// A discrete, independently releasable portion of a vault's funds.
///
/// # Invariants
/// - `index` and `amount` never change after creation.
/// - `proof_hash`, `confidence_score`, and `attestation` are set once on `pending → submitted`.
/// - `approvals` only grows.
/// - `settlement` is set exactly when `status == Released`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Milestone identifier.
    pub milestone_id: MilestoneId,
    /// Position within the vault.
    pub index: u32,
    /// Claim description.
    pub description: String,
    /// Allotted amount in minor units.
    pub amount: u64,
    /// Content-derived proof hash of the accepted evidence.
    pub proof_hash: Option<HashDigest>,
    /// Distinct validators that co-signed the attestation.
    pub approvals: BTreeSet<ValidatorId>,
    /// Lifecycle status.
    pub status: MilestoneStatus,
    /// Oracle confidence score (0-100) of the accepted evidence.
    pub confidence_score: Option<u8>,
    /// Structured attestation metadata of the accepted evidence.
    pub attestation: Option<AttestationRecord>,
    /// Settlement receipt once released.
    pub settlement: Option<SettlementReceipt>,
}

impl Milestone {
    /// Returns the number of distinct validator approvals.
    #[must_use]
    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }

    /// Returns true when the milestone funds have been transferred.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.status == MilestoneStatus::Released
    }
}

// ============================================================================
// SECTION: Vault
// ============================================================================

/// Escrow vault holding a fixed total disbursed through milestones.
///
/// # Invariants
/// - `total_amount` is immutable and greater than zero.
/// - `released_amount` never decreases and never exceeds `total_amount`.
/// - Milestone indices are `0..milestones.len()` in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    /// Vault identifier.
    pub vault_id: VaultId,
    /// Human-readable project name.
    pub name: String,
    /// Project description.
    pub description: String,
    /// Owning authority.
    pub authority: AuthorityId,
    /// Impact category.
    pub category: VaultCategory,
    /// Project location label.
    pub location: String,
    /// Total committed amount in minor units.
    pub total_amount: u64,
    /// Amount released so far in minor units.
    pub released_amount: u64,
    /// Milestones in execution order.
    pub milestones: Vec<Milestone>,
    /// Creation time supplied by the caller.
    pub created_at: Timestamp,
}

impl Vault {
    /// Returns the milestone at `index`, if any.
    #[must_use]
    pub fn milestone(&self, index: u32) -> Option<&Milestone> {
        self.milestones.iter().find(|milestone| milestone.index == index)
    }

    /// Returns a mutable reference to the milestone at `index`, if any.
    pub(crate) fn milestone_mut(&mut self, index: u32) -> Option<&mut Milestone> {
        self.milestones.iter_mut().find(|milestone| milestone.index == index)
    }

    /// Returns the amount still held in escrow.
    #[must_use]
    pub const fn locked_amount(&self) -> u64 {
        self.total_amount.saturating_sub(self.released_amount)
    }

    /// Verifies the accounting and ordering invariants of the vault.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.total_amount == 0 {
            return Err(format!("vault {} has zero total amount", self.vault_id));
        }
        let mut allotted: u64 = 0;
        let mut released: u64 = 0;
        for (position, milestone) in self.milestones.iter().enumerate() {
            if u32::try_from(position).ok() != Some(milestone.index) {
                return Err(format!("vault {} milestone indices out of order", self.vault_id));
            }
            allotted = allotted
                .checked_add(milestone.amount)
                .ok_or_else(|| format!("vault {} milestone amounts overflow", self.vault_id))?;
            if milestone.is_released() {
                released += milestone.amount;
            }
            if milestone.is_released() != milestone.settlement.is_some() {
                return Err(format!(
                    "vault {} milestone {} settlement does not match status",
                    self.vault_id, milestone.index
                ));
            }
        }
        if allotted != self.total_amount {
            return Err(format!(
                "vault {} milestone amounts sum to {allotted}, expected {}",
                self.vault_id, self.total_amount
            ));
        }
        if released != self.released_amount {
            return Err(format!(
                "vault {} released amount {} does not match released milestones {released}",
                self.vault_id, self.released_amount
            ));
        }
        if self.released_amount > self.total_amount {
            return Err(format!("vault {} released more than its total", self.vault_id));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Amount Split
// ============================================================================

/// Splits `total` into `count` equal shares, assigning the remainder to the last share.
///
/// Returns `None` when `count` is zero.
#[must_use]
pub fn split_amount(total: u64, count: u32) -> Option<Vec<u64>> {
    if count == 0 {
        return None;
    }
    let divisor = u64::from(count);
    let share = total / divisor;
    let remainder = total % divisor;
    let mut shares = vec![share; count as usize];
    if let Some(last) = shares.last_mut() {
        *last += remainder;
    }
    Some(shares)
}
