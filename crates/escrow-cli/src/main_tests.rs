// crates/escrow-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and bounded input reads.
// Purpose: Ensure CLI inputs are validated and size limits fail closed.
// Dependencies: escrow-cli main helpers
// ============================================================================

//! ## Overview
//! Validates evidence argument parsing, `read_bytes_with_limit`, the
//! `--store-path` override, and the clap definition itself.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use clap::CommandFactory;
use clap::Parser;
use escrow_config::EscrowConfig;
use escrow_config::StoreType;
use escrow_core::Timestamp;
use escrow_core::VaultCategory;

use super::CategoryArg;
use super::Cli;
use super::Commands;
use super::ReadLimitError;
use super::VaultCommand;
use super::apply_store_override;
use super::parse_evidence_spec;
use super::read_bytes_with_limit;
use super::vault_spec;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn clap_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn evidence_spec_splits_on_first_equals() {
    let (mime, path) = parse_evidence_spec("image/jpeg=photos/a=b.jpg").unwrap();
    assert_eq!(mime, "image/jpeg");
    assert_eq!(path, PathBuf::from("photos/a=b.jpg"));
}

#[test]
fn evidence_spec_rejects_missing_parts() {
    for spec in ["photo.jpg", "=photo.jpg", "image/jpeg=", " =photo.jpg"] {
        let err = parse_evidence_spec(spec).unwrap_err();
        assert!(err.to_string().contains("MIME=PATH"), "{spec}");
    }
}

#[test]
fn read_bytes_with_limit_accepts_exact_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evidence.bin");
    fs::write(&path, vec![7_u8; 64]).unwrap();
    let bytes = read_bytes_with_limit(&path, 64).unwrap();
    assert_eq!(bytes.len(), 64);
}

#[test]
fn read_bytes_with_limit_rejects_oversize() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evidence.bin");
    fs::write(&path, vec![7_u8; 65]).unwrap();
    match read_bytes_with_limit(&path, 64) {
        Err(ReadLimitError::TooLarge {
            size,
            limit,
        }) => {
            assert_eq!(size, 65);
            assert_eq!(limit, 64);
        }
        other => panic!("expected too large, got {other:?}"),
    }
}

#[test]
fn read_bytes_with_limit_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_bytes_with_limit(&dir.path().join("absent.bin"), 64);
    assert!(matches!(result, Err(ReadLimitError::Io(_))));
}

#[test]
fn store_path_override_selects_sqlite() {
    let config = apply_store_override(EscrowConfig::default(), Some("state/escrow.db".into()))
        .unwrap();
    assert_eq!(config.store.store_type, StoreType::Sqlite);
    assert!(config.store.sqlite_config().is_some());

    let untouched = apply_store_override(EscrowConfig::default(), None).unwrap();
    assert_eq!(untouched, EscrowConfig::default());
}

#[test]
fn vault_create_arguments_map_to_spec() {
    let cli = Cli::try_parse_from([
        "escrow",
        "vault",
        "create",
        "--name",
        "Solar Pumps",
        "--authority",
        "maker-1",
        "--category",
        "agriculture",
        "--total",
        "30000",
        "--milestones",
        "3",
        "--milestone-description",
        "survey",
        "--milestone-description",
        "install",
    ])
    .unwrap();
    let Some(Commands::Vault {
        command: VaultCommand::Create(command),
    }) = cli.command
    else {
        panic!("expected vault create");
    };
    assert_eq!(command.category, CategoryArg::Agriculture);
    let spec = vault_spec(command, Timestamp::Logical(9));
    assert_eq!(spec.category, VaultCategory::Agriculture);
    assert_eq!(spec.total_amount, 30_000);
    assert_eq!(spec.milestone_count, 3);
    assert_eq!(spec.milestone_descriptions, vec!["survey".to_string(), "install".to_string()]);
    assert_eq!(spec.created_at, Timestamp::Logical(9));
}

#[test]
fn unsigned_queue_requires_validator() {
    assert!(Cli::try_parse_from(["escrow", "queue", "--unsigned"]).is_err());
    assert!(Cli::try_parse_from(["escrow", "queue", "--unsigned", "--validator", "v-1"]).is_ok());
}
