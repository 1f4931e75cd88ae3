// crates/escrow-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical escrow.toml example.
// Purpose: Give operators a complete, valid starting configuration.
// Dependencies: none
// ============================================================================

//! ## Overview
//! The example covers every section of [`crate::EscrowConfig`] and is kept
//! loadable by the crate tests.

// ============================================================================
// SECTION: Example
// ============================================================================

/// Canonical example configuration.
const CONFIG_TOML_EXAMPLE: &str = r#"# escrow.toml

[engine]
quorum_threshold = 3
min_confidence = 60
oracle_timeout_ms = 30000
ledger_timeout_ms = 30000
max_evidence_items = 16
max_evidence_bytes = 10485760

[oracle]
endpoint = "https://oracle.example.org/attest"
timeout_ms = 10000
max_response_bytes = 1048576
user_agent = "quorum-escrow/0.1"

[ledger]
endpoint = "https://ledger.example.org/escrow"
timeout_ms = 10000
allowed_hosts = ["ledger.example.org"]

[store]
type = "sqlite"
path = "escrow.db"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"
max_versions = 32

[audit]
sink = "file"
path = "escrow-audit.jsonl"
"#;

/// Returns a complete example `escrow.toml`.
#[must_use]
pub fn config_toml_example() -> String {
    CONFIG_TOML_EXAMPLE.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
