// crates/escrow-core/src/core/time.rs
// ============================================================================
// Module: Quorum Escrow Time Model
// Description: Canonical timestamp representations for vault records.
// Purpose: Keep core state deterministic by never reading wall-clock time.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Timestamps are supplied by callers (CLI, tests, hosts). The core engine
//! never reads wall-clock time directly, so identical inputs replay to
//! identical vault state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in vault and attestation records.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value.
    Logical(u64),
}

impl Timestamp {
    /// Returns the timestamp as unix milliseconds when available.
    #[must_use]
    pub const fn as_unix_millis(&self) -> Option<i64> {
        match self {
            Self::UnixMillis(value) => Some(*value),
            Self::Logical(_) => None,
        }
    }
}
