// crates/escrow-core/tests/audit_sink.rs
// ============================================================================
// Module: Audit Sink Tests
// Description: JSON-line audit output of the file sink.
// ============================================================================
//! ## Overview
//! Runs a short escrow flow against a [`FileAuditSink`] and checks that each
//! line is a standalone JSON event with the expected labels.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]
#![allow(dead_code, reason = "Common module may have unused helpers.")]

mod common;

use std::fs;
use std::sync::Arc;

use escrow_core::EngineConfig;
use escrow_core::EscrowAuditEvent;
use escrow_core::EscrowAuditSink;
use escrow_core::EscrowEngine;
use escrow_core::FileAuditSink;
use escrow_core::InMemoryVaultStore;
use escrow_core::Timestamp;
use escrow_core::ValidatorId;
use escrow_core::VaultId;
use serde_json::Value;

use crate::common::RecordingLedger;
use crate::common::ScriptedOracle;
use crate::common::proof;
use crate::common::validators;
use crate::common::vault_spec;

#[test]
fn file_sink_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let sink = FileAuditSink::new(&path).unwrap();
    let vault_id = VaultId::new("vault-3");
    sink.record(
        &EscrowAuditEvent::new("vault_created", Some(&vault_id), None).with_actor("maker-1"),
    );
    sink.record(
        &EscrowAuditEvent::new("approval_recorded", Some(&vault_id), Some(1))
            .with_actor("validator-2")
            .noop(),
    );
    drop(sink);

    let reopened = FileAuditSink::new(&path).unwrap();
    reopened.record(&EscrowAuditEvent::new("quorum_reached", Some(&vault_id), Some(1)));

    let lines: Vec<Value> = fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["event"], "vault_created");
    assert_eq!(lines[0]["actor"], "maker-1");
    assert_eq!(lines[1]["outcome"], "noop");
    assert_eq!(lines[1]["milestone_index"], 1);
    assert_eq!(lines[2]["event"], "quorum_reached");
    assert_eq!(lines[2]["vault_id"], "vault-3");
}

#[test]
fn engine_flow_is_audited_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("escrow-audit.jsonl");
    let engine = EscrowEngine::new(
        EngineConfig::default(),
        Arc::new(ScriptedOracle::accepting(88.0)),
        Arc::new(RecordingLedger::default()),
        InMemoryVaultStore::new(),
        Arc::new(FileAuditSink::new(&path).unwrap()),
    )
    .unwrap();
    let vault = engine.create_vault(vault_spec(9_000, 3)).unwrap();
    engine
        .submit_proof(&vault.vault_id, 0, &proof("trench dug"), Timestamp::Logical(2))
        .unwrap();
    for validator in validators(3) {
        engine.approve_milestone(&vault.vault_id, 0, &validator).unwrap();
    }
    let err = engine.approve_milestone(&vault.vault_id, 5, &ValidatorId::new("validator-1"));
    assert!(err.is_err());
    engine.release_milestone(&vault.vault_id, 0).unwrap();

    let events: Vec<Value> = fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let names: Vec<&str> = events.iter().filter_map(|event| event["event"].as_str()).collect();
    assert_eq!(names.first(), Some(&"vault_created"));
    assert!(names.contains(&"proof_attested"));
    assert!(names.contains(&"quorum_reached"));
    assert_eq!(names.last(), Some(&"milestone_released"));
    let failed = events.iter().find(|event| event["outcome"] == "error").unwrap();
    assert_eq!(failed["error_kind"], "not_found");
}
