// crates/escrow-core/src/core/mod.rs
// ============================================================================
// Module: Quorum Escrow Core Types
// Description: Canonical escrow data model, attestation, and settlement records.
// Purpose: Provide stable, serializable types for vaults and milestones.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Core types define vaults, milestones, attestation verdicts, settlement
//! receipts, and reporting summaries. These types are the canonical source of
//! truth for every outer surface (CLI, stores, HTTP adapters).

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod attestation;
pub mod hashing;
pub mod identifiers;
pub mod settlement;
pub mod summary;
pub mod time;
pub mod vault;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use attestation::AttestationRecord;
pub use attestation::AttestationRequest;
pub use attestation::AttestationResult;
pub use attestation::EvidenceItem;
pub use attestation::OracleVerdict;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::AuthorityId;
pub use identifiers::MilestoneId;
pub use identifiers::SettlementReference;
pub use identifiers::ValidatorId;
pub use identifiers::VaultId;
pub use settlement::SettlementKey;
pub use settlement::SettlementReceipt;
pub use summary::PortfolioSummary;
pub use summary::ReviewItem;
pub use summary::VaultSummary;
pub use time::Timestamp;
pub use vault::DEFAULT_QUORUM_THRESHOLD;
pub use vault::MAX_MILESTONES;
pub use vault::Milestone;
pub use vault::MilestoneStatus;
pub use vault::Vault;
pub use vault::VaultCategory;
pub use vault::VaultSpec;
