// crates/escrow-cli/src/wiring.rs
// ============================================================================
// Module: Engine Wiring
// Description: Builds an escrow engine from validated configuration.
// Purpose: Select store, audit sink, oracle, and ledger backends from config.
// Dependencies: escrow-config, escrow-core, escrow-providers, escrow-store-sqlite
// ============================================================================

//! ## Overview
//! [`build_engine`] turns an [`EscrowConfig`] into a ready engine. Backends
//! are closed enums so the engine keeps a single concrete type whatever the
//! config selects. A missing `[oracle]` or `[ledger]` section yields an
//! unconfigured client whose calls fail as transport errors, so read-only
//! commands work without remote endpoints.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::sync::Arc;

use escrow_config::AuditConfig;
use escrow_config::AuditSinkType;
use escrow_config::EscrowConfig;
use escrow_config::StoreConfig;
use escrow_core::AttestationOracle;
use escrow_core::AttestationRequest;
use escrow_core::EscrowAuditSink;
use escrow_core::EscrowEngine;
use escrow_core::EscrowError;
use escrow_core::FileAuditSink;
use escrow_core::InMemoryVaultStore;
use escrow_core::LedgerApproval;
use escrow_core::LedgerError;
use escrow_core::LedgerRelease;
use escrow_core::NoopAuditSink;
use escrow_core::OracleError;
use escrow_core::OracleVerdict;
use escrow_core::SettlementLedger;
use escrow_core::SettlementReference;
use escrow_core::StderrAuditSink;
use escrow_core::StoreError;
use escrow_core::Vault;
use escrow_core::VaultStore;
use escrow_providers::HttpAttestationOracle;
use escrow_providers::HttpError;
use escrow_providers::HttpSettlementLedger;
use escrow_store_sqlite::SqliteStoreError;
use escrow_store_sqlite::SqliteVaultStore;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures while assembling the engine from configuration.
#[derive(Debug, Error)]
pub enum WiringError {
    /// Oracle client construction failed.
    #[error("oracle client: {0}")]
    Oracle(HttpError),
    /// Ledger client construction failed.
    #[error("ledger client: {0}")]
    Ledger(HttpError),
    /// Vault store could not be opened.
    #[error("vault store: {0}")]
    Store(#[from] SqliteStoreError),
    /// Audit sink could not be opened.
    #[error("audit sink: {0}")]
    Audit(#[from] io::Error),
    /// Engine rejected the configuration or persisted state.
    #[error(transparent)]
    Engine(#[from] EscrowError),
}

// ============================================================================
// SECTION: Backends
// ============================================================================

/// Oracle backend selected by configuration.
pub enum OracleClient {
    /// HTTP attestation oracle.
    Http(HttpAttestationOracle),
    /// No `[oracle]` section configured.
    Unconfigured,
}

impl AttestationOracle for OracleClient {
    fn evaluate(&self, request: &AttestationRequest) -> Result<OracleVerdict, OracleError> {
        match self {
            Self::Http(oracle) => oracle.evaluate(request),
            Self::Unconfigured => {
                Err(OracleError::Transport("no [oracle] endpoint configured".to_string()))
            }
        }
    }
}

/// Ledger backend selected by configuration.
pub enum LedgerClient {
    /// HTTP settlement ledger.
    Http(HttpSettlementLedger),
    /// No `[ledger]` section configured.
    Unconfigured,
}

impl SettlementLedger for LedgerClient {
    fn approve(&self, approval: &LedgerApproval) -> Result<bool, LedgerError> {
        match self {
            Self::Http(ledger) => ledger.approve(approval),
            Self::Unconfigured => Err(unconfigured_ledger()),
        }
    }

    fn release(&self, release: &LedgerRelease) -> Result<SettlementReference, LedgerError> {
        match self {
            Self::Http(ledger) => ledger.release(release),
            Self::Unconfigured => Err(unconfigured_ledger()),
        }
    }
}

/// Error returned by the unconfigured ledger.
fn unconfigured_ledger() -> LedgerError {
    LedgerError::Transport("no [ledger] endpoint configured".to_string())
}

/// Vault store backend selected by configuration.
#[derive(Clone)]
pub enum StoreBackend {
    /// Process-local store.
    Memory(InMemoryVaultStore),
    /// Durable `SQLite` store.
    Sqlite(SqliteVaultStore),
}

impl VaultStore for StoreBackend {
    fn load_all(&self) -> Result<Vec<Vault>, StoreError> {
        match self {
            Self::Memory(store) => store.load_all(),
            Self::Sqlite(store) => store.load_all(),
        }
    }

    fn save(&self, vault: &Vault) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.save(vault),
            Self::Sqlite(store) => store.save(vault),
        }
    }

    fn readiness(&self) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.readiness(),
            Self::Sqlite(store) => store.readiness(),
        }
    }
}

/// Engine type produced by [`build_engine`].
pub type ConfiguredEngine = EscrowEngine<OracleClient, LedgerClient, StoreBackend>;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Opens the vault store selected by the `[store]` section.
///
/// # Errors
///
/// Returns [`WiringError::Store`] when the `SQLite` store cannot be opened.
pub fn open_store(config: &StoreConfig) -> Result<StoreBackend, WiringError> {
    match config.sqlite_config() {
        Some(sqlite) => Ok(StoreBackend::Sqlite(SqliteVaultStore::new(sqlite)?)),
        None => Ok(StoreBackend::Memory(InMemoryVaultStore::new())),
    }
}

/// Opens the audit sink selected by the `[audit]` section.
///
/// # Errors
///
/// Returns [`WiringError::Audit`] when the audit file cannot be opened.
pub fn open_audit_sink(config: &AuditConfig) -> Result<Arc<dyn EscrowAuditSink>, WiringError> {
    match (config.sink, &config.path) {
        (AuditSinkType::File, Some(path)) => Ok(Arc::new(FileAuditSink::new(path)?)),
        (AuditSinkType::None, _) => Ok(Arc::new(NoopAuditSink)),
        _ => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Builds the escrow engine described by `config`.
///
/// # Errors
///
/// Returns [`WiringError`] when any backend cannot be constructed or the
/// engine refuses the persisted state.
pub fn build_engine(config: &EscrowConfig) -> Result<ConfiguredEngine, WiringError> {
    let oracle = match &config.oracle {
        Some(section) => OracleClient::Http(
            HttpAttestationOracle::new(section.clone()).map_err(WiringError::Oracle)?,
        ),
        None => OracleClient::Unconfigured,
    };
    let ledger = match &config.ledger {
        Some(section) => LedgerClient::Http(
            HttpSettlementLedger::new(section.clone()).map_err(WiringError::Ledger)?,
        ),
        None => LedgerClient::Unconfigured,
    };
    let store = open_store(&config.store)?;
    let audit = open_audit_sink(&config.audit)?;
    let engine = EscrowEngine::new(
        config.to_engine_config(),
        Arc::new(oracle),
        Arc::new(ledger),
        store,
        audit,
    )?;
    Ok(engine)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use escrow_config::EscrowConfig;
    use escrow_config::StoreType;
    use escrow_core::AttestationOracle;
    use escrow_core::AttestationRequest;
    use escrow_core::EvidenceItem;
    use escrow_core::OracleError;

    use super::OracleClient;
    use super::StoreBackend;
    use super::build_engine;
    use super::open_store;

    #[test]
    fn default_config_builds_memory_engine() {
        let engine = build_engine(&EscrowConfig::default()).unwrap();
        assert_eq!(engine.quorum_threshold(), 3);
        assert!(engine.list_vaults().unwrap().is_empty());
        engine.readiness().unwrap();
    }

    #[test]
    fn unconfigured_oracle_is_transport_failure() {
        let request =
            AttestationRequest::new("claim", vec![EvidenceItem::new("text/plain", b"x".to_vec())]);
        let err = OracleClient::Unconfigured.evaluate(&request).unwrap_err();
        assert!(matches!(err, OracleError::Transport(_)));
    }

    #[test]
    fn sqlite_section_opens_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EscrowConfig::default();
        config.store.store_type = StoreType::Sqlite;
        config.store.path = Some(dir.path().join("escrow.db"));
        assert!(matches!(open_store(&config.store).unwrap(), StoreBackend::Sqlite(_)));
        let memory = open_store(&EscrowConfig::default().store).unwrap();
        assert!(matches!(memory, StoreBackend::Memory(_)));
    }
}
