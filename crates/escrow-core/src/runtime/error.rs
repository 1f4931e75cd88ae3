// crates/escrow-core/src/runtime/error.rs
// ============================================================================
// Module: Quorum Escrow Errors
// Description: Engine-boundary error taxonomy.
// Purpose: Give callers stable, typed failure kinds with retry guidance.
// Dependencies: crate::{core, interfaces}, thiserror
// ============================================================================

//! ## Overview
//! Every runtime component surfaces [`EscrowError`]. Lower-layer errors
//! (oracle, ledger, store, hashing) are folded into it at the component that
//! observes them. Only [`EscrowError::OracleUnavailable`] and
//! [`EscrowError::LedgerFailure`] are retryable; neither implies any state
//! mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::VaultId;
use crate::core::hashing::HashError;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Escrow engine errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - [`EscrowError::kind`] labels never change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// Caller input violated a constraint.
    #[error("validation error: {0}")]
    Validation(String),
    /// Milestone is not in a state that permits the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Oracle could not be reached or returned a malformed verdict.
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),
    /// Oracle judged the evidence invalid.
    #[error("oracle rejected evidence: {summary}")]
    OracleRejected {
        /// Oracle analysis summary.
        summary: String,
        /// Forensic flags raised by the oracle.
        flags: Vec<String>,
    },
    /// Ledger transport failure or deadline expiry.
    #[error("ledger failure: {0}")]
    LedgerFailure(String),
    /// Milestone funds were already transferred.
    #[error("milestone {index} of vault {vault_id} already released")]
    AlreadyReleased {
        /// Vault identifier.
        vault_id: VaultId,
        /// Milestone index.
        index: u32,
    },
    /// Vault or milestone does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Persistence failure or poisoned lock.
    #[error("store error: {0}")]
    Store(String),
}

impl EscrowError {
    /// Returns a stable snake_case label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidState(_) => "invalid_state",
            Self::OracleUnavailable(_) => "oracle_unavailable",
            Self::OracleRejected {
                ..
            } => "oracle_rejected",
            Self::LedgerFailure(_) => "ledger_failure",
            Self::AlreadyReleased {
                ..
            } => "already_released",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store_error",
        }
    }

    /// Returns true when the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::OracleUnavailable(_) | Self::LedgerFailure(_))
    }
}

impl From<StoreError> for EscrowError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<HashError> for EscrowError {
    fn from(err: HashError) -> Self {
        Self::Validation(err.to_string())
    }
}
