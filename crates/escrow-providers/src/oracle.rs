// crates/escrow-providers/src/oracle.rs
// ============================================================================
// Module: HTTP Attestation Oracle
// Description: Attestation oracle client over JSON/HTTP.
// Purpose: Submit claim evidence and parse the untrusted verdict.
// Dependencies: escrow-core, base64, serde
// ============================================================================

//! ## Overview
//! [`HttpAttestationOracle`] posts the claim text and base64-encoded evidence
//! to the configured endpoint and decodes the verdict JSON. Non-2xx statuses
//! and transport failures surface as [`OracleError::Transport`]; malformed
//! or oversize bodies surface as [`OracleError::InvalidResponse`]. The verdict
//! is returned raw; normalization belongs to the attestation gate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use escrow_core::AttestationOracle;
use escrow_core::AttestationRequest;
use escrow_core::OracleError;
use escrow_core::OracleVerdict;
use reqwest::Url;
use serde::Serialize;

use crate::http::HttpClientConfig;
use crate::http::HttpEndpoint;
use crate::http::HttpError;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Request body sent to the oracle.
#[derive(Serialize)]
struct OracleRequestBody<'a> {
    /// Claim text describing the completed work.
    claim_text: &'a str,
    /// Encoded evidence items.
    evidence: Vec<OracleEvidence<'a>>,
}

/// Single encoded evidence item.
#[derive(Serialize)]
struct OracleEvidence<'a> {
    /// Declared MIME type.
    mime_type: &'a str,
    /// Evidence bytes, standard base64.
    data_base64: String,
}

// ============================================================================
// SECTION: Oracle Client
// ============================================================================

/// Attestation oracle reached over HTTP.
pub struct HttpAttestationOracle {
    /// Policy-bound endpoint.
    endpoint: HttpEndpoint,
    /// Evaluation URL.
    url: Url,
}

impl HttpAttestationOracle {
    /// Creates an oracle client for the configured endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] when the endpoint violates URL policy.
    pub fn new(config: HttpClientConfig) -> Result<Self, HttpError> {
        let endpoint = HttpEndpoint::new(config)?;
        let url = endpoint.base().clone();
        Ok(Self {
            endpoint,
            url,
        })
    }
}

impl AttestationOracle for HttpAttestationOracle {
    fn evaluate(&self, request: &AttestationRequest) -> Result<OracleVerdict, OracleError> {
        let body = OracleRequestBody {
            claim_text: &request.claim,
            evidence: request
                .evidence
                .iter()
                .map(|item| OracleEvidence {
                    mime_type: &item.mime_type,
                    data_base64: STANDARD.encode(&item.bytes),
                })
                .collect(),
        };
        let reply = self.endpoint.post_json(&self.url, &body, &[]).map_err(map_http_error)?;
        if !reply.is_success() {
            return Err(OracleError::Transport(format!(
                "oracle returned status {}: {}",
                reply.status,
                reply.excerpt()
            )));
        }
        reply.json::<OracleVerdict>().map_err(|err| OracleError::InvalidResponse(err.to_string()))
    }
}

/// Maps endpoint failures onto oracle error kinds.
fn map_http_error(err: HttpError) -> OracleError {
    match err {
        HttpError::Response(message) => OracleError::InvalidResponse(message),
        HttpError::Policy(_) | HttpError::Transport(_) => OracleError::Transport(err.to_string()),
    }
}
