// crates/escrow-core/src/runtime/quorum.rs
// ============================================================================
// Module: Quorum Escrow Quorum Ledger
// Description: Distinct validator co-signature tracking.
// Purpose: Count approvals without double counting and detect quorum.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Approvals are a set of distinct validator identities per milestone.
//! - A repeated approval from the same validator is a no-op in every state.
//! - New validators may sign `submitted` milestones; the approval that reaches
//!   the threshold promotes the milestone to `releasable`.
//! - New validators signing a `releasable` milestone are recorded but inert.
//! - New validators signing `pending` or `released` milestones are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::DEFAULT_QUORUM_THRESHOLD;
use crate::core::Milestone;
use crate::core::MilestoneStatus;
use crate::core::ValidatorId;
use crate::runtime::error::EscrowError;
use crate::runtime::machine::MilestoneStateMachine;

// ============================================================================
// SECTION: Approval Outcome
// ============================================================================

/// Result of a single approval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "approvals", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// Approval added; quorum not yet reached.
    Recorded(usize),
    /// Approval added and the milestone became releasable.
    QuorumReached(usize),
    /// Approval added to an already releasable milestone.
    OverQuorum(usize),
    /// Validator had already approved; nothing changed.
    Duplicate(usize),
}

impl ApprovalOutcome {
    /// Returns the approval count after the attempt.
    #[must_use]
    pub const fn approvals(self) -> usize {
        match self {
            Self::Recorded(count)
            | Self::QuorumReached(count)
            | Self::OverQuorum(count)
            | Self::Duplicate(count) => count,
        }
    }

    /// Returns true when the validator's signature was newly recorded.
    #[must_use]
    pub const fn is_new(self) -> bool {
        !matches!(self, Self::Duplicate(_))
    }
}

// ============================================================================
// SECTION: Quorum Ledger
// ============================================================================

/// Tracks validator approvals against a fixed threshold.
///
/// # Invariants
/// - `threshold >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumLedger {
    /// Distinct approvals required for release.
    threshold: usize,
}

impl Default for QuorumLedger {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_QUORUM_THRESHOLD,
        }
    }
}

impl QuorumLedger {
    /// Creates a quorum ledger with the provided threshold.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Validation`] when `threshold` is zero.
    pub fn new(threshold: usize) -> Result<Self, EscrowError> {
        if threshold == 0 {
            return Err(EscrowError::Validation("quorum threshold must be at least 1".to_string()));
        }
        Ok(Self {
            threshold,
        })
    }

    /// Returns the configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> usize {
        self.threshold
    }

    /// Returns the number of distinct approvals on a milestone.
    #[must_use]
    pub fn approval_count(milestone: &Milestone) -> usize {
        milestone.approval_count()
    }

    /// Records a validator approval on a milestone.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::InvalidState`] when a new validator signs a
    /// milestone that is pending or already released.
    pub fn approve(
        &self,
        milestone: &mut Milestone,
        validator: &ValidatorId,
    ) -> Result<ApprovalOutcome, EscrowError> {
        if milestone.approvals.contains(validator) {
            return Ok(ApprovalOutcome::Duplicate(milestone.approval_count()));
        }
        match milestone.status {
            MilestoneStatus::Submitted => {
                milestone.approvals.insert(validator.clone());
                let count = milestone.approval_count();
                if MilestoneStateMachine::promote_if_quorum(milestone, self.threshold) {
                    Ok(ApprovalOutcome::QuorumReached(count))
                } else {
                    Ok(ApprovalOutcome::Recorded(count))
                }
            }
            MilestoneStatus::Releasable => {
                milestone.approvals.insert(validator.clone());
                Ok(ApprovalOutcome::OverQuorum(milestone.approval_count()))
            }
            MilestoneStatus::Pending | MilestoneStatus::Released => {
                Err(EscrowError::InvalidState(format!(
                    "cannot approve milestone {}: status is {}",
                    milestone.milestone_id,
                    milestone.status.as_str()
                )))
            }
        }
    }
}
