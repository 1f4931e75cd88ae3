// crates/escrow-providers/src/lib.rs
// ============================================================================
// Module: Quorum Escrow Providers
// Description: HTTP implementations of the oracle and ledger interfaces.
// Purpose: Connect the escrow engine to remote attestation and settlement services.
// Dependencies: escrow-core, reqwest, base64, serde
// ============================================================================

//! ## Overview
//! This crate ships blocking HTTP clients for the two external services the
//! escrow engine consumes: the attestation oracle and the settlement ledger.
//! Both share one outbound policy layer with strict URL checks and response
//! size limits.
//! Invariants:
//! - Remote responses are untrusted and fail closed.
//! - Transport failures and 5xx statuses map to retryable error kinds.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod http;
pub mod ledger;
pub mod oracle;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use http::HttpClientConfig;
pub use http::HttpEndpoint;
pub use http::HttpError;
pub use http::HttpReply;
pub use ledger::HttpSettlementLedger;
pub use ledger::IDEMPOTENCY_HEADER;
pub use oracle::HttpAttestationOracle;
