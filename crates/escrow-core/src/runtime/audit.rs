// crates/escrow-core/src/runtime/audit.rs
// ============================================================================
// Module: Quorum Escrow Audit Logging
// Description: Structured audit events for escrow operations.
// Purpose: Emit JSON-line audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every engine operation emits one [`EscrowAuditEvent`] describing what
//! happened to which milestone and on whose behalf. Sinks serialize events as
//! JSON lines so deployments can route them to any logging pipeline. Audit
//! failures never affect escrow state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::VaultId;
use crate::runtime::error::EscrowError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Escrow audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscrowAuditEvent {
    /// Event identifier (for example `quorum_reached`).
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Vault identifier when applicable.
    pub vault_id: Option<String>,
    /// Milestone index when applicable.
    pub milestone_index: Option<u32>,
    /// Acting validator or authority when known.
    pub actor: Option<String>,
    /// Outcome label: `ok`, `noop`, or `error`.
    pub outcome: &'static str,
    /// Error kind label for failed operations.
    pub error_kind: Option<&'static str>,
    /// Free-form detail.
    pub detail: Option<String>,
}

impl EscrowAuditEvent {
    /// Creates a successful event with a consistent timestamp.
    #[must_use]
    pub fn new(
        event: &'static str,
        vault_id: Option<&VaultId>,
        milestone_index: Option<u32>,
    ) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            vault_id: vault_id.map(ToString::to_string),
            milestone_index,
            actor: None,
            outcome: "ok",
            error_kind: None,
            detail: None,
        }
    }

    /// Sets the acting identity.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Sets the event detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Marks the event as an idempotent no-op.
    #[must_use]
    pub const fn noop(mut self) -> Self {
        self.outcome = "noop";
        self
    }

    /// Marks the event as failed with the error kind and message.
    #[must_use]
    pub fn failed(mut self, err: &EscrowError) -> Self {
        self.outcome = "error";
        self.error_kind = Some(err.kind());
        self.detail = Some(err.to_string());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for escrow events.
pub trait EscrowAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &EscrowAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl EscrowAuditSink for StderrAuditSink {
    fn record(&self, event: &EscrowAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EscrowAuditSink for FileAuditSink {
    fn record(&self, event: &EscrowAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl EscrowAuditSink for NoopAuditSink {
    fn record(&self, _event: &EscrowAuditEvent) {}
}
