// crates/escrow-core/src/runtime/machine.rs
// ============================================================================
// Module: Quorum Escrow Milestone State Machine
// Description: The only code allowed to change milestone status.
// Purpose: Enforce forward-only, single-step milestone transitions.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Milestones advance `pending → submitted → releasable → released` with no
//! skips and no backward moves. Each transition validates the current status
//! and writes the fields that transition owns. Callers hold the vault's
//! critical section while invoking these functions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::AttestationResult;
use crate::core::Milestone;
use crate::core::MilestoneStatus;
use crate::core::SettlementReceipt;
use crate::core::Timestamp;
use crate::core::Vault;
use crate::runtime::error::EscrowError;

// ============================================================================
// SECTION: State Machine
// ============================================================================

/// Milestone lifecycle transitions.
pub struct MilestoneStateMachine;

impl MilestoneStateMachine {
    /// Applies an accepted attestation: `pending → submitted`.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::InvalidState`] when the milestone is not pending.
    pub fn apply_attestation(
        milestone: &mut Milestone,
        result: &AttestationResult,
        attested_at: Timestamp,
    ) -> Result<(), EscrowError> {
        Self::require(milestone, MilestoneStatus::Pending, "submit proof for")?;
        milestone.proof_hash = Some(result.proof_hash.clone());
        milestone.confidence_score = Some(result.confidence_score);
        milestone.attestation = Some(result.to_record(attested_at));
        milestone.status = MilestoneStatus::Submitted;
        Ok(())
    }

    /// Promotes a submitted milestone to releasable once `threshold` approvals exist.
    ///
    /// Returns true only for the call that performs the transition.
    pub fn promote_if_quorum(milestone: &mut Milestone, threshold: usize) -> bool {
        if milestone.status == MilestoneStatus::Submitted && milestone.approval_count() >= threshold
        {
            milestone.status = MilestoneStatus::Releasable;
            return true;
        }
        false
    }

    /// Applies a completed settlement: `releasable → released`.
    ///
    /// Increments the vault's released amount by the milestone amount.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NotFound`] for unknown milestones,
    /// [`EscrowError::AlreadyReleased`] when the milestone was already released,
    /// and [`EscrowError::InvalidState`] for any other non-releasable status.
    pub fn apply_release(
        vault: &mut Vault,
        index: u32,
        receipt: SettlementReceipt,
    ) -> Result<(), EscrowError> {
        let vault_id = vault.vault_id.clone();
        let milestone = vault.milestone_mut(index).ok_or_else(|| {
            EscrowError::NotFound(format!("milestone {index} of vault {vault_id}"))
        })?;
        if milestone.status == MilestoneStatus::Released {
            return Err(EscrowError::AlreadyReleased {
                vault_id,
                index,
            });
        }
        Self::require(milestone, MilestoneStatus::Releasable, "release")?;
        let amount = milestone.amount;
        milestone.status = MilestoneStatus::Released;
        milestone.settlement = Some(receipt);
        vault.released_amount = vault.released_amount.checked_add(amount).ok_or_else(|| {
            EscrowError::InvalidState(format!("vault {vault_id} released amount overflow"))
        })?;
        Ok(())
    }

    /// Fails unless the milestone is in `expected` status.
    fn require(
        milestone: &Milestone,
        expected: MilestoneStatus,
        action: &str,
    ) -> Result<(), EscrowError> {
        if milestone.status == expected {
            return Ok(());
        }
        Err(EscrowError::InvalidState(format!(
            "cannot {action} milestone {}: status is {}, expected {}",
            milestone.milestone_id,
            milestone.status.as_str(),
            expected.as_str()
        )))
    }
}
