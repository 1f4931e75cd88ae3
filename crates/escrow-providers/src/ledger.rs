// crates/escrow-providers/src/ledger.rs
// ============================================================================
// Module: HTTP Settlement Ledger
// Description: Settlement ledger client over JSON/HTTP.
// Purpose: Forward validator co-signatures and issue idempotent releases.
// Dependencies: escrow-core, serde
// ============================================================================

//! ## Overview
//! [`HttpSettlementLedger`] talks to a ledger service exposing `approve` and
//! `release` routes beneath the configured base URL. Releases carry the
//! deterministic settlement key in an `Idempotency-Key` header so a retried
//! transfer resolves to the original transaction.
//!
//! A replayed key is answered with the original reference, either as a 2xx
//! or as a 409 whose body names it. A 409 without a reference, or naming a
//! different idempotency key, is a transfer this key never made.
//!
//! Status mapping:
//! - 2xx: success, body decoded.
//! - 409 with the original reference: success.
//! - other 409: [`LedgerError::AlreadySettled`].
//! - other 4xx: [`LedgerError::Rejected`].
//! - 5xx and transport failures: [`LedgerError::Transport`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use escrow_core::LedgerApproval;
use escrow_core::LedgerError;
use escrow_core::LedgerRelease;
use escrow_core::SettlementLedger;
use escrow_core::SettlementReference;
use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;

use crate::http::HttpClientConfig;
use crate::http::HttpEndpoint;
use crate::http::HttpError;
use crate::http::HttpReply;

/// Header carrying the settlement idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
/// Status used by ledgers to flag an already settled transfer.
const CONFLICT_STATUS: u16 = 409;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Release request body.
#[derive(Serialize)]
struct ReleaseBody<'a> {
    /// Vault identifier.
    vault_id: &'a str,
    /// Milestone index.
    milestone_index: u32,
    /// Amount in minor units.
    amount: u64,
    /// Idempotency key, repeated in the body for auditing.
    idempotency_key: String,
}

/// Approval response body.
#[derive(Deserialize)]
struct ApproveReply {
    /// Whether the ledger accepted the co-signature.
    approved: bool,
}

/// Release response body.
#[derive(Deserialize)]
struct ReleaseReply {
    /// Ledger transaction reference.
    reference: String,
    /// Idempotency key the ledger matched, when echoed.
    #[serde(default)]
    idempotency_key: Option<String>,
}

// ============================================================================
// SECTION: Ledger Client
// ============================================================================

/// Settlement ledger reached over HTTP.
pub struct HttpSettlementLedger {
    /// Policy-bound endpoint.
    endpoint: HttpEndpoint,
    /// Approval route.
    approve_url: Url,
    /// Release route.
    release_url: Url,
}

impl HttpSettlementLedger {
    /// Creates a ledger client for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] when the endpoint violates URL policy.
    pub fn new(config: HttpClientConfig) -> Result<Self, HttpError> {
        let endpoint = HttpEndpoint::new(config)?;
        let approve_url = endpoint.url_for(&["approve"])?;
        let release_url = endpoint.url_for(&["release"])?;
        Ok(Self {
            endpoint,
            approve_url,
            release_url,
        })
    }
}

impl SettlementLedger for HttpSettlementLedger {
    fn approve(&self, approval: &LedgerApproval) -> Result<bool, LedgerError> {
        let reply =
            self.endpoint.post_json(&self.approve_url, approval, &[]).map_err(map_http_error)?;
        check_status(&reply)?;
        let decoded: ApproveReply = reply.json().map_err(map_http_error)?;
        Ok(decoded.approved)
    }

    fn release(&self, release: &LedgerRelease) -> Result<SettlementReference, LedgerError> {
        let idempotency_key = release.idempotency_key.to_string();
        let body = ReleaseBody {
            vault_id: release.key.vault_id.as_str(),
            milestone_index: release.key.milestone_index,
            amount: release.amount,
            idempotency_key: idempotency_key.clone(),
        };
        let reply = self
            .endpoint
            .post_json(&self.release_url, &body, &[(IDEMPOTENCY_HEADER, idempotency_key.as_str())])
            .map_err(map_http_error)?;
        if reply.status == CONFLICT_STATUS
            && let Some(reference) = replayed_reference(&reply, &idempotency_key)
        {
            return Ok(reference);
        }
        check_status(&reply)?;
        let decoded: ReleaseReply = reply.json().map_err(map_http_error)?;
        let reference = decoded.reference.trim();
        if reference.is_empty() {
            return Err(LedgerError::Rejected("ledger returned an empty reference".to_string()));
        }
        Ok(SettlementReference::new(reference))
    }
}

/// Extracts the original reference from a conflict reply for the same key.
fn replayed_reference(reply: &HttpReply, idempotency_key: &str) -> Option<SettlementReference> {
    let decoded: ReleaseReply = reply.json().ok()?;
    if decoded.idempotency_key.as_deref().is_some_and(|echoed| echoed != idempotency_key) {
        return None;
    }
    let reference = decoded.reference.trim();
    if reference.is_empty() {
        return None;
    }
    Some(SettlementReference::new(reference))
}

/// Classifies non-2xx statuses.
fn check_status(reply: &HttpReply) -> Result<(), LedgerError> {
    if reply.is_success() {
        return Ok(());
    }
    let message = format!("ledger returned status {}: {}", reply.status, reply.excerpt());
    match reply.status {
        CONFLICT_STATUS => Err(LedgerError::AlreadySettled(message)),
        400..=499 => Err(LedgerError::Rejected(message)),
        _ => Err(LedgerError::Transport(message)),
    }
}

/// Maps endpoint failures onto ledger error kinds.
fn map_http_error(err: HttpError) -> LedgerError {
    LedgerError::Transport(err.to_string())
}
