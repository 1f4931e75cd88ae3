// crates/escrow-core/src/runtime/gate.rs
// ============================================================================
// Module: Quorum Escrow Attestation Gate
// Description: Oracle invocation and verdict normalization.
// Purpose: Turn untrusted oracle verdicts into bounded attestation results.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The attestation gate validates a proof submission, calls the oracle under
//! a deadline, and normalizes the verdict. It never touches vault state.
//!
//! Normalization rules:
//! - Non-finite confidence is a malformed verdict and maps to
//!   [`EscrowError::OracleUnavailable`].
//! - Finite confidence is clamped to 0-100 and rounded.
//! - `is_valid = false`, or confidence below the configured minimum, maps to
//!   [`EscrowError::OracleRejected`].
//! - The proof hash is always recomputed from the request content.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::core::AttestationRequest;
use crate::core::AttestationResult;
use crate::core::OracleVerdict;
use crate::interfaces::AttestationOracle;
use crate::runtime::deadline::call_with_deadline;
use crate::runtime::error::EscrowError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Input and acceptance limits applied by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateLimits {
    /// Maximum number of evidence items per submission.
    pub max_evidence_items: usize,
    /// Maximum total evidence bytes per submission.
    pub max_evidence_bytes: usize,
    /// Minimum normalized confidence required for acceptance.
    pub min_confidence: u8,
}

// ============================================================================
// SECTION: Attestation Gate
// ============================================================================

/// Evaluates proof submissions against an attestation oracle.
pub struct AttestationGate<O> {
    /// Oracle implementation shared with deadline workers.
    oracle: Arc<O>,
    /// Optional oracle call deadline.
    timeout: Option<Duration>,
    /// Submission limits.
    limits: GateLimits,
}

impl<O> AttestationGate<O>
where
    O: AttestationOracle + Send + Sync + 'static,
{
    /// Creates a new attestation gate.
    #[must_use]
    pub const fn new(oracle: Arc<O>, timeout: Option<Duration>, limits: GateLimits) -> Self {
        Self {
            oracle,
            timeout,
            limits,
        }
    }

    /// Evaluates a proof submission.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Validation`] for malformed submissions,
    /// [`EscrowError::OracleUnavailable`] on transport, deadline, or malformed
    /// verdicts, and [`EscrowError::OracleRejected`] when the evidence is not accepted.
    pub fn evaluate(&self, request: &AttestationRequest) -> Result<AttestationResult, EscrowError> {
        self.validate_request(request)?;
        let proof_hash = request.proof_hash()?;

        let oracle = Arc::clone(&self.oracle);
        let owned = request.clone();
        let verdict = call_with_deadline("oracle", self.timeout, move || oracle.evaluate(&owned))
            .map_err(|err| EscrowError::OracleUnavailable(err.describe("oracle call")))?
            .map_err(|err| EscrowError::OracleUnavailable(err.to_string()))?;

        let confidence_score = normalize_confidence(&verdict)?;
        if !verdict.is_valid {
            return Err(EscrowError::OracleRejected {
                summary: verdict.analysis,
                flags: verdict.flags,
            });
        }
        if confidence_score < self.limits.min_confidence {
            return Err(EscrowError::OracleRejected {
                summary: format!(
                    "confidence {confidence_score} below minimum {}",
                    self.limits.min_confidence
                ),
                flags: verdict.flags,
            });
        }
        Ok(AttestationResult {
            is_valid: true,
            confidence_score,
            proof_hash,
            analysis_summary: verdict.analysis,
            geo_label: verdict.geo_label,
            flags: verdict.flags,
            oracle_anchor: verdict.proof_hash,
        })
    }

    /// Rejects submissions that violate the configured limits.
    fn validate_request(&self, request: &AttestationRequest) -> Result<(), EscrowError> {
        if request.claim.trim().is_empty() {
            return Err(EscrowError::Validation("claim text must not be empty".to_string()));
        }
        if request.evidence.is_empty() {
            return Err(EscrowError::Validation(
                "at least one evidence item is required".to_string(),
            ));
        }
        if request.evidence.len() > self.limits.max_evidence_items {
            return Err(EscrowError::Validation(format!(
                "too many evidence items: {} (max {})",
                request.evidence.len(),
                self.limits.max_evidence_items
            )));
        }
        if request.evidence.iter().any(|item| item.mime_type.trim().is_empty()) {
            return Err(EscrowError::Validation("evidence mime type must not be empty".to_string()));
        }
        let total = request.evidence_bytes();
        if total > self.limits.max_evidence_bytes {
            return Err(EscrowError::Validation(format!(
                "evidence exceeds size limit: {total} bytes (max {})",
                self.limits.max_evidence_bytes
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Clamps and rounds the verdict confidence into 0-100.
fn normalize_confidence(verdict: &OracleVerdict) -> Result<u8, EscrowError> {
    if !verdict.confidence_score.is_finite() {
        return Err(EscrowError::OracleUnavailable(
            "malformed verdict: confidence score is not finite".to_string(),
        ));
    }
    let bounded = verdict.confidence_score.clamp(0.0, 100.0).round();
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Value is clamped to 0..=100 and rounded before the cast."
    )]
    let score = bounded as u8;
    Ok(score)
}
