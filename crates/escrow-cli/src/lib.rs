// crates/escrow-cli/src/lib.rs
// ============================================================================
// Module: Quorum Escrow CLI Library
// Description: Shared helpers for the `escrow` binary.
// Purpose: Keep the message catalog and engine wiring testable outside main.
// Dependencies: escrow-config, escrow-core, escrow-providers, escrow-store-sqlite
// ============================================================================

//! ## Overview
//! The `escrow` binary is a thin dispatcher. User-facing strings live in
//! [`messages`] and the construction of an engine from a validated
//! [`escrow_config::EscrowConfig`] lives in [`wiring`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod messages;
pub mod wiring;
