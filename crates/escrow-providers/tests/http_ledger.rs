// crates/escrow-providers/tests/http_ledger.rs
// ============================================================================
// Module: HTTP Ledger Tests
// Description: Routes, idempotency headers, and status mapping for the ledger client.
// ============================================================================
//! ## Overview
//! Drives [`HttpSettlementLedger`] against scripted local servers, then runs
//! a full escrow flow through the engine with both HTTP providers attached.

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

use std::sync::Arc;

use escrow_core::AttestationRequest;
use escrow_core::AuthorityId;
use escrow_core::EngineConfig;
use escrow_core::EscrowEngine;
use escrow_core::EvidenceItem;
use escrow_core::InMemoryVaultStore;
use escrow_core::LedgerApproval;
use escrow_core::LedgerError;
use escrow_core::LedgerRelease;
use escrow_core::NoopAuditSink;
use escrow_core::SettlementKey;
use escrow_core::SettlementLedger;
use escrow_core::SettlementReference;
use escrow_core::Timestamp;
use escrow_core::ValidatorId;
use escrow_core::VaultCategory;
use escrow_core::VaultId;
use escrow_core::VaultSpec;
use escrow_providers::HttpAttestationOracle;
use escrow_providers::HttpSettlementLedger;
use serde_json::json;

use crate::common::local_config;
use crate::common::scripted_server;

fn release_request() -> LedgerRelease {
    let key = SettlementKey::new(VaultId::new("vault-7"), 2);
    LedgerRelease {
        idempotency_key: key.idempotency_key().unwrap(),
        key,
        amount: 3_334,
    }
}

#[test]
fn release_sends_idempotency_key() {
    let server = scripted_server(vec![(200, json!({"reference": "TX_42"}).to_string())]);
    let ledger = HttpSettlementLedger::new(local_config(&format!("{}/ledger/", server.base_url)))
        .unwrap();
    let release = release_request();

    let reference = ledger.release(&release).unwrap();
    assert_eq!(reference, SettlementReference::new("TX_42"));

    let captured = server.finish();
    assert_eq!(captured[0].url, "/ledger/release");
    let expected_key = release.idempotency_key.to_string();
    assert_eq!(captured[0].idempotency_key.as_deref(), Some(expected_key.as_str()));
    assert_eq!(
        captured[0].body,
        json!({
            "vault_id": "vault-7",
            "milestone_index": 2,
            "amount": 3_334,
            "idempotency_key": expected_key
        })
    );
}

#[test]
fn approve_forwards_cosignature() {
    let server = scripted_server(vec![
        (200, json!({"approved": true}).to_string()),
        (200, json!({"approved": false}).to_string()),
    ]);
    let ledger = HttpSettlementLedger::new(local_config(&server.base_url)).unwrap();
    let approval = LedgerApproval {
        vault_id: VaultId::new("vault-1"),
        milestone_index: 0,
        validator_id: ValidatorId::new("validator-9"),
    };
    assert!(ledger.approve(&approval).unwrap());
    assert!(!ledger.approve(&approval).unwrap());

    let captured = server.finish();
    assert_eq!(captured[0].url, "/approve");
    assert_eq!(captured[0].body["validator_id"], "validator-9");
    assert_eq!(captured[0].idempotency_key, None);
}

#[test]
fn status_codes_map_to_ledger_errors() {
    let server = scripted_server(vec![
        (409, "{\"error\":\"settled\"}".to_string()),
        (422, "{\"error\":\"bad amount\"}".to_string()),
        (502, "{}".to_string()),
        (200, json!({"reference": "  "}).to_string()),
        (200, "not json".to_string()),
    ]);
    let ledger = HttpSettlementLedger::new(local_config(&server.base_url)).unwrap();
    let release = release_request();

    assert!(matches!(ledger.release(&release), Err(LedgerError::AlreadySettled(_))));
    assert!(matches!(ledger.release(&release), Err(LedgerError::Rejected(_))));
    assert!(matches!(ledger.release(&release), Err(LedgerError::Transport(_))));
    assert!(matches!(ledger.release(&release), Err(LedgerError::Rejected(_))));
    assert!(matches!(ledger.release(&release), Err(LedgerError::Transport(_))));
    server.finish();
}

#[test]
fn replayed_release_resolves_to_original_reference() {
    let release = release_request();
    let key = release.idempotency_key.to_string();
    let server = scripted_server(vec![
        (200, json!({"reference": "TX_ORIGINAL"}).to_string()),
        (409, json!({"reference": "TX_ORIGINAL", "idempotency_key": key}).to_string()),
        (409, json!({"reference": "TX_ORIGINAL"}).to_string()),
        (409, json!({"reference": "TX_OTHER", "idempotency_key": "sha256:feed"}).to_string()),
    ]);
    let ledger = HttpSettlementLedger::new(local_config(&server.base_url)).unwrap();
    let original = SettlementReference::new("TX_ORIGINAL");

    assert_eq!(ledger.release(&release).unwrap(), original);
    assert_eq!(ledger.release(&release).unwrap(), original);
    assert_eq!(ledger.release(&release).unwrap(), original);
    assert!(matches!(ledger.release(&release), Err(LedgerError::AlreadySettled(_))));

    let captured = server.finish();
    assert_eq!(captured.len(), 4);
    assert!(
        captured.iter().all(|request| request.idempotency_key.as_deref() == Some(key.as_str()))
    );
}

#[test]
fn restarted_engine_converges_on_replayed_release() {
    let store = InMemoryVaultStore::new();
    let vault_id = {
        let oracle_server = scripted_server(vec![(
            200,
            json!({"is_valid": true, "confidence_score": 97, "analysis": "ok"}).to_string(),
        )]);
        let approvals: Vec<(u16, String)> =
            (0..3).map(|_| (200, json!({"approved": true}).to_string())).collect();
        let ledger_server = scripted_server(approvals);
        let engine = http_engine(&oracle_server.base_url, &ledger_server.base_url, store.clone());
        let vault_id = releasable_vault(&engine);
        oracle_server.finish();
        ledger_server.finish();
        vault_id
    };

    let key = SettlementKey::new(vault_id.clone(), 0).idempotency_key().unwrap().to_string();
    let ledger_server = scripted_server(vec![(
        409,
        json!({"reference": "TX_BEFORE_RESTART", "idempotency_key": key}).to_string(),
    )]);
    let engine = http_engine("http://127.0.0.1:9", &ledger_server.base_url, store);
    let receipt = engine.release_milestone(&vault_id, 0).unwrap();
    assert_eq!(receipt.reference, SettlementReference::new("TX_BEFORE_RESTART"));
    assert_eq!(engine.vault_state(&vault_id).unwrap().released_amount, 10_000);

    let again = engine.release_milestone(&vault_id, 0).unwrap();
    assert_eq!(again, receipt);
    assert_eq!(ledger_server.finish().len(), 1);
}

#[test]
fn engine_settles_through_http_providers() {
    let oracle_server = scripted_server(vec![(
        200,
        json!({"is_valid": true, "confidence_score": 97, "analysis": "ok"}).to_string(),
    )]);
    let mut ledger_script: Vec<(u16, String)> =
        (0..3).map(|_| (200, json!({"approved": true}).to_string())).collect();
    ledger_script.push((200, json!({"reference": "TX_HTTP_1"}).to_string()));
    let ledger_server = scripted_server(ledger_script);

    let engine =
        http_engine(&oracle_server.base_url, &ledger_server.base_url, InMemoryVaultStore::new());
    let vault_id = releasable_vault(&engine);
    let receipt = engine.release_milestone(&vault_id, 0).unwrap();
    assert_eq!(receipt.reference, SettlementReference::new("TX_HTTP_1"));
    assert_eq!(receipt.amount, 10_000);

    let again = engine.release_milestone(&vault_id, 0).unwrap();
    assert_eq!(again, receipt);

    assert_eq!(oracle_server.finish().len(), 1);
    let ledger_calls = ledger_server.finish();
    assert_eq!(ledger_calls.len(), 4);
    assert_eq!(ledger_calls[3].url, "/release");
}

type HttpEngine = EscrowEngine<HttpAttestationOracle, HttpSettlementLedger, InMemoryVaultStore>;

fn http_engine(oracle_url: &str, ledger_url: &str, store: InMemoryVaultStore) -> HttpEngine {
    EscrowEngine::new(
        EngineConfig::default(),
        Arc::new(HttpAttestationOracle::new(local_config(oracle_url)).unwrap()),
        Arc::new(HttpSettlementLedger::new(local_config(ledger_url)).unwrap()),
        store,
        Arc::new(NoopAuditSink),
    )
    .unwrap()
}

/// Creates a two-milestone vault and drives milestone 0 to releasable.
fn releasable_vault(engine: &HttpEngine) -> VaultId {
    let vault = engine
        .create_vault(VaultSpec {
            name: "Clinic Wing".to_string(),
            description: String::new(),
            authority: AuthorityId::new("maker-1"),
            category: VaultCategory::Healthcare,
            location: String::new(),
            total_amount: 20_000,
            milestone_count: 2,
            milestone_descriptions: Vec::new(),
            created_at: Timestamp::Logical(1),
        })
        .unwrap();
    let proof =
        AttestationRequest::new("foundation poured", vec![EvidenceItem::new("image/png", vec![7])]);
    engine.submit_proof(&vault.vault_id, 0, &proof, Timestamp::Logical(2)).unwrap();
    for n in 1..=3 {
        let approved = engine
            .approve_milestone(&vault.vault_id, 0, &ValidatorId::new(format!("validator-{n}")))
            .unwrap();
        assert!(approved.ledger_forwarded);
    }
    vault.vault_id
}
