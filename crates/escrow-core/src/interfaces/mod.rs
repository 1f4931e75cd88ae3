// crates/escrow-core/src/interfaces/mod.rs
// ============================================================================
// Module: Quorum Escrow Interfaces
// Description: Backend-agnostic interfaces for oracles, ledgers, and storage.
// Purpose: Define the contract surfaces used by the Quorum Escrow runtime.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Quorum Escrow integrates with external systems
//! without embedding backend-specific details. Oracle and ledger responses are
//! untrusted; the runtime normalizes and validates them before mutating state.
//! Implementations must be `Send + Sync` because calls run under deadlines on
//! worker threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::AttestationRequest;
use crate::core::HashDigest;
use crate::core::OracleVerdict;
use crate::core::SettlementKey;
use crate::core::SettlementReference;
use crate::core::ValidatorId;
use crate::core::Vault;
use crate::core::VaultId;

// ============================================================================
// SECTION: Attestation Oracle
// ============================================================================

/// Attestation oracle errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Every variant means no verdict was obtained.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Transport failure reaching the oracle.
    #[error("oracle transport error: {0}")]
    Transport(String),
    /// Oracle response was malformed or exceeded limits.
    #[error("oracle response invalid: {0}")]
    InvalidResponse(String),
}

/// External service that judges proof evidence.
pub trait AttestationOracle {
    /// Evaluates a claim and its evidence.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] when no verdict could be obtained.
    fn evaluate(&self, request: &AttestationRequest) -> Result<OracleVerdict, OracleError>;
}

// ============================================================================
// SECTION: Settlement Ledger
// ============================================================================

/// Ledger errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transport failure reaching the ledger.
    #[error("ledger transport error: {0}")]
    Transport(String),
    /// Ledger rejected the request.
    #[error("ledger rejected request: {0}")]
    Rejected(String),
    /// Ledger reports the transfer was already settled.
    #[error("ledger reports transfer already settled: {0}")]
    AlreadySettled(String),
}

/// Validator co-signature forwarded to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerApproval {
    /// Vault identifier.
    pub vault_id: VaultId,
    /// Milestone index.
    pub milestone_index: u32,
    /// Signing validator.
    pub validator_id: ValidatorId,
}

/// Transfer instruction sent to the ledger.
///
/// # Invariants
/// - `idempotency_key` is derived from `key` and identical across retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRelease {
    /// Settlement key.
    pub key: SettlementKey,
    /// Amount to transfer in minor units.
    pub amount: u64,
    /// Deterministic idempotency key.
    pub idempotency_key: HashDigest,
}

/// External settlement layer that records co-signatures and moves funds.
pub trait SettlementLedger {
    /// Records a validator co-signature. Returns the ledger's acceptance flag.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the ledger cannot be reached or rejects the call.
    fn approve(&self, approval: &LedgerApproval) -> Result<bool, LedgerError>;

    /// Transfers the milestone funds and returns the transaction reference.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the transfer fails or was already settled.
    fn release(&self, release: &LedgerRelease) -> Result<SettlementReference, LedgerError>;
}

// ============================================================================
// SECTION: Vault Store
// ============================================================================

/// Vault store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("vault store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("vault store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("vault store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("vault store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("vault store error: {0}")]
    Store(String),
}

/// Durable store for vault snapshots.
pub trait VaultStore {
    /// Loads every persisted vault.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails or data is corrupt.
    fn load_all(&self) -> Result<Vec<Vault>, StoreError>;

    /// Saves a vault snapshot, replacing any prior snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when saving fails.
    fn save(&self, vault: &Vault) -> Result<(), StoreError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
