// crates/escrow-config/src/lib.rs
// ============================================================================
// Module: Quorum Escrow Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for escrow.toml semantics.
// Dependencies: escrow-core, escrow-providers, escrow-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `escrow-config` defines the configuration model for the escrow engine and
//! its outer surfaces. Loading is strict and fail-closed: oversize, non-UTF-8,
//! unknown-key, and out-of-range inputs are rejected before any component is
//! constructed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
