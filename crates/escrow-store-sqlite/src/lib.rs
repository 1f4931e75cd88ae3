// crates/escrow-store-sqlite/src/lib.rs
// ============================================================================
// Module: Quorum Escrow SQLite Store
// Description: SQLite-backed VaultStore implementation.
// Purpose: Persist vault snapshots durably with integrity checks.
// Dependencies: escrow-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate provides a durable [`escrow_core::VaultStore`] backed by
//! `SQLite`. Every save appends a canonical JSON snapshot with its SHA-256
//! digest; loads verify the digest and fail closed on any mismatch.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_VAULT_BYTES;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteVaultStore;
pub use store::VaultVersionSummary;
