// crates/escrow-core/src/core/settlement.rs
// ============================================================================
// Module: Quorum Escrow Settlement Records
// Description: Settlement keys, idempotency keys, and release receipts.
// Purpose: Identify each milestone transfer so it happens at most once.
// Dependencies: crate::core::{hashing, identifiers}, serde
// ============================================================================

//! ## Overview
//! Every release is keyed by `(vault_id, milestone_index)`. The idempotency key
//! sent to the ledger is the SHA-256 digest of the canonical JSON of that
//! pair, so a ledger can deduplicate retries across process restarts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::SettlementReference;
use crate::core::identifiers::VaultId;

// ============================================================================
// SECTION: Settlement Key
// ============================================================================

/// Identity of a single milestone transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SettlementKey {
    /// Vault identifier.
    pub vault_id: VaultId,
    /// Milestone index within the vault.
    pub milestone_index: u32,
}

impl SettlementKey {
    /// Creates a new settlement key.
    #[must_use]
    pub const fn new(vault_id: VaultId, milestone_index: u32) -> Self {
        Self {
            vault_id,
            milestone_index,
        }
    }

    /// Computes the deterministic idempotency key for this transfer.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn idempotency_key(&self) -> Result<HashDigest, HashError> {
        hash_canonical_json(DEFAULT_HASH_ALGORITHM, self)
    }
}

// ============================================================================
// SECTION: Settlement Receipt
// ============================================================================

/// Receipt recorded on a released milestone.
///
/// # Invariants
/// - Issued at most once per [`SettlementKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    /// Ledger transaction reference.
    pub reference: SettlementReference,
    /// Amount transferred in minor units.
    pub amount: u64,
    /// Idempotency key presented to the ledger.
    pub idempotency_key: HashDigest,
}
