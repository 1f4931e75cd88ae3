// crates/escrow-core/src/runtime/mod.rs
// ============================================================================
// Module: Quorum Escrow Runtime
// Description: Registry, gate, quorum, settlement, and engine facade.
// Purpose: Orchestrate milestone releases against external collaborators.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the escrow control flow: proof attestation,
//! validator quorum, and idempotent settlement. All outer surfaces call into
//! [`EscrowEngine`] so every path enforces the same invariants.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
mod deadline;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod gate;
pub mod machine;
pub mod quorum;
pub mod registry;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::EscrowAuditEvent;
pub use audit::EscrowAuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use dispatcher::SettlementDispatcher;
pub use engine::ApprovalReceipt;
pub use engine::EngineConfig;
pub use engine::EscrowEngine;
pub use error::EscrowError;
pub use gate::AttestationGate;
pub use gate::GateLimits;
pub use machine::MilestoneStateMachine;
pub use quorum::ApprovalOutcome;
pub use quorum::QuorumLedger;
pub use registry::VaultRegistry;
pub use store::InMemoryVaultStore;
