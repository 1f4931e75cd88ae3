// crates/escrow-core/src/lib.rs
// ============================================================================
// Module: Quorum Escrow Core Library
// Description: Public API surface for the Quorum Escrow core.
// Purpose: Expose core types, interfaces, and runtime components.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Quorum Escrow core decides when a milestone's funds may be released and
//! guarantees that each release happens at most once. Funds move only after an
//! external attestation oracle certifies the submitted proof and a quorum of
//! distinct validators co-signs it. The core is backend-agnostic and integrates
//! with oracles, ledgers, and stores through explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AttestationOracle;
pub use interfaces::LedgerApproval;
pub use interfaces::LedgerError;
pub use interfaces::LedgerRelease;
pub use interfaces::OracleError;
pub use interfaces::SettlementLedger;
pub use interfaces::StoreError;
pub use interfaces::VaultStore;
pub use runtime::ApprovalOutcome;
pub use runtime::ApprovalReceipt;
pub use runtime::AttestationGate;
pub use runtime::EngineConfig;
pub use runtime::EscrowAuditEvent;
pub use runtime::EscrowAuditSink;
pub use runtime::EscrowEngine;
pub use runtime::EscrowError;
pub use runtime::FileAuditSink;
pub use runtime::GateLimits;
pub use runtime::InMemoryVaultStore;
pub use runtime::MilestoneStateMachine;
pub use runtime::NoopAuditSink;
pub use runtime::QuorumLedger;
pub use runtime::SettlementDispatcher;
pub use runtime::StderrAuditSink;
pub use runtime::VaultRegistry;
