// crates/escrow-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared fakes and builders for escrow-core tests.
// Purpose: Provide scripted oracles, recording ledgers, and engine builders.
// Dependencies: escrow-core
// ============================================================================

//! ## Overview
//! Provides an oracle with scripted verdicts, a ledger that records every
//! transfer, an audit sink that captures events, and helpers that assemble an
//! engine over an in-memory store.

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

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use escrow_core::AttestationOracle;
use escrow_core::AttestationRequest;
use escrow_core::AuthorityId;
use escrow_core::EngineConfig;
use escrow_core::EscrowAuditEvent;
use escrow_core::EscrowAuditSink;
use escrow_core::EscrowEngine;
use escrow_core::EvidenceItem;
use escrow_core::InMemoryVaultStore;
use escrow_core::LedgerApproval;
use escrow_core::LedgerError;
use escrow_core::LedgerRelease;
use escrow_core::OracleError;
use escrow_core::OracleVerdict;
use escrow_core::SettlementLedger;
use escrow_core::SettlementReference;
use escrow_core::Timestamp;
use escrow_core::ValidatorId;
use escrow_core::VaultCategory;
use escrow_core::VaultSpec;

// ============================================================================
// SECTION: Scripted Oracle
// ============================================================================

/// Oracle returning queued verdicts, then a default verdict.
pub struct ScriptedOracle {
    /// Queued responses consumed in order.
    queue: Mutex<VecDeque<Result<OracleVerdict, OracleError>>>,
    /// Verdict returned once the queue is empty.
    fallback: OracleVerdict,
    /// Artificial latency per call.
    delay: Option<Duration>,
    /// Number of evaluate calls observed.
    calls: AtomicUsize,
}

impl ScriptedOracle {
    /// Oracle that always accepts with the given confidence.
    pub fn accepting(confidence: f64) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: verdict(true, confidence),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Oracle that sleeps before answering.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::accepting(95.0)
        }
    }

    /// Queues a response ahead of the fallback.
    pub fn push(&self, response: Result<OracleVerdict, OracleError>) {
        self.queue.lock().unwrap().push_back(response);
    }

    /// Returns the number of evaluate calls observed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AttestationOracle for ScriptedOracle {
    fn evaluate(&self, _request: &AttestationRequest) -> Result<OracleVerdict, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.queue.lock().unwrap().pop_front().unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Builds an oracle verdict.
pub fn verdict(is_valid: bool, confidence: f64) -> OracleVerdict {
    OracleVerdict {
        is_valid,
        confidence_score: confidence,
        proof_hash: Some("oracle-anchor".to_string()),
        analysis: if is_valid { "work verified".to_string() } else { "evidence mismatch".to_string() },
        geo_label: Some("Nairobi, Kenya".to_string()),
        flags: if is_valid { Vec::new() } else { vec!["metadata_stripped".to_string()] },
    }
}

// ============================================================================
// SECTION: Recording Ledger
// ============================================================================

/// Ledger that records transfers and co-signatures.
#[derive(Default)]
pub struct RecordingLedger {
    /// Completed transfers.
    releases: Mutex<Vec<LedgerRelease>>,
    /// Forwarded co-signatures.
    approvals: Mutex<Vec<LedgerApproval>>,
    /// Number of upcoming release calls that fail with a transport error.
    failing_releases: AtomicUsize,
    /// Number of upcoming approve calls that fail with a transport error.
    failing_approvals: AtomicUsize,
    /// Artificial latency per release.
    delay: Mutex<Option<Duration>>,
}

impl RecordingLedger {
    /// Makes the next `count` release calls fail.
    pub fn fail_releases(&self, count: usize) {
        self.failing_releases.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` approve calls fail.
    pub fn fail_approvals(&self, count: usize) {
        self.failing_approvals.store(count, Ordering::SeqCst);
    }

    /// Adds latency to each release call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Returns the completed transfers.
    pub fn releases(&self) -> Vec<LedgerRelease> {
        self.releases.lock().unwrap().clone()
    }

    /// Returns the forwarded co-signatures.
    pub fn approvals(&self) -> Vec<LedgerApproval> {
        self.approvals.lock().unwrap().clone()
    }
}

/// Decrements a failure budget, returning true when a failure should be injected.
fn take_failure(counter: &AtomicUsize) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

impl SettlementLedger for RecordingLedger {
    fn approve(&self, approval: &LedgerApproval) -> Result<bool, LedgerError> {
        if take_failure(&self.failing_approvals) {
            return Err(LedgerError::Transport("connection reset".to_string()));
        }
        self.approvals.lock().unwrap().push(approval.clone());
        Ok(true)
    }

    fn release(&self, release: &LedgerRelease) -> Result<SettlementReference, LedgerError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if take_failure(&self.failing_releases) {
            return Err(LedgerError::Transport("connection reset".to_string()));
        }
        let mut releases = self.releases.lock().unwrap();
        releases.push(release.clone());
        Ok(SettlementReference::new(format!("TX_{}", releases.len())))
    }
}

// ============================================================================
// SECTION: Audit Capture
// ============================================================================

/// Audit sink capturing events in memory.
#[derive(Default)]
pub struct CapturingAuditSink {
    /// Captured events.
    events: Mutex<Vec<EscrowAuditEvent>>,
}

impl CapturingAuditSink {
    /// Returns the captured event names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|event| event.event).collect()
    }

    /// Returns the captured events.
    pub fn events(&self) -> Vec<EscrowAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EscrowAuditSink for CapturingAuditSink {
    fn record(&self, event: &EscrowAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Engine type used across tests.
pub type TestEngine = EscrowEngine<ScriptedOracle, RecordingLedger, InMemoryVaultStore>;

/// Engine plus handles to its collaborators.
pub struct Harness {
    /// Engine under test.
    pub engine: TestEngine,
    /// Oracle handle.
    pub oracle: Arc<ScriptedOracle>,
    /// Ledger handle.
    pub ledger: Arc<RecordingLedger>,
    /// Store handle sharing the engine's snapshots.
    pub store: InMemoryVaultStore,
    /// Audit handle.
    pub audit: Arc<CapturingAuditSink>,
}

/// Builds a harness with the given config and oracle.
pub fn harness_with(config: EngineConfig, oracle: ScriptedOracle) -> Harness {
    let oracle = Arc::new(oracle);
    let ledger = Arc::new(RecordingLedger::default());
    let store = InMemoryVaultStore::new();
    let audit = Arc::new(CapturingAuditSink::default());
    let engine = EscrowEngine::new(
        config,
        Arc::clone(&oracle),
        Arc::clone(&ledger),
        store.clone(),
        audit.clone(),
    )
    .expect("engine");
    Harness {
        engine,
        oracle,
        ledger,
        store,
        audit,
    }
}

/// Builds a harness with default config and an oracle accepting at 95.
pub fn harness() -> Harness {
    harness_with(EngineConfig::default(), ScriptedOracle::accepting(95.0))
}

/// Builds a vault spec for the given total and milestone count.
pub fn vault_spec(total_amount: u64, milestone_count: u32) -> VaultSpec {
    VaultSpec {
        name: "Solar Pumps".to_string(),
        description: "Irrigation for smallholder farms".to_string(),
        authority: AuthorityId::new("maker-1"),
        category: VaultCategory::Agriculture,
        location: "Kisumu".to_string(),
        total_amount,
        milestone_count,
        milestone_descriptions: Vec::new(),
        created_at: Timestamp::Logical(1),
    }
}

/// Builds a single-item proof request.
pub fn proof(claim: &str) -> AttestationRequest {
    AttestationRequest::new(claim, vec![EvidenceItem::new("image/jpeg", b"jpeg-bytes".to_vec())])
}

/// Returns validator identities `validator-1..=count`.
pub fn validators(count: usize) -> Vec<ValidatorId> {
    (1..=count).map(|n| ValidatorId::new(format!("validator-{n}"))).collect()
}
