// crates/escrow-core/src/core/attestation.rs
// ============================================================================
// Module: Quorum Escrow Attestation Model
// Description: Evidence requests, raw oracle verdicts, and normalized results.
// Purpose: Capture proof evidence and derive content-addressed proof hashes.
// Dependencies: crate::core::{hashing, time}, serde
// ============================================================================

//! ## Overview
//! A maker submits a claim plus evidence items. The oracle returns a raw
//! [`OracleVerdict`]; the attestation gate normalizes it into an
//! [`AttestationResult`] whose proof hash is derived from the evidence content
//! rather than trusted from the oracle.
//!
//! The proof hash is the SHA-256 digest of the RFC 8785 canonical JSON of
//! `{claim, evidence: [{mime_type, sha256}]}` where `sha256` is the hex digest
//! of the raw evidence bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_bytes;
use crate::core::hashing::hash_canonical_json;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Evidence
// ============================================================================

/// Single piece of proof evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// MIME type of the evidence payload (for example `image/jpeg`).
    pub mime_type: String,
    /// Raw evidence bytes.
    pub bytes: Vec<u8>,
}

impl EvidenceItem {
    /// Creates a new evidence item.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Proof submission evaluated by the attestation oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRequest {
    /// Claim text describing the completed work.
    pub claim: String,
    /// Evidence supporting the claim.
    pub evidence: Vec<EvidenceItem>,
}

/// Canonical evidence entry hashed into the proof hash.
#[derive(Serialize)]
struct EvidenceFingerprint<'a> {
    /// Evidence MIME type.
    mime_type: &'a str,
    /// Hex SHA-256 of the evidence bytes.
    sha256: String,
}

/// Canonical proof document hashed into the proof hash.
#[derive(Serialize)]
struct ProofDocument<'a> {
    /// Claim text.
    claim: &'a str,
    /// Evidence fingerprints in submission order.
    evidence: Vec<EvidenceFingerprint<'a>>,
}

impl AttestationRequest {
    /// Creates a new attestation request.
    #[must_use]
    pub fn new(claim: impl Into<String>, evidence: Vec<EvidenceItem>) -> Self {
        Self {
            claim: claim.into(),
            evidence,
        }
    }

    /// Returns the total number of evidence bytes.
    #[must_use]
    pub fn evidence_bytes(&self) -> usize {
        self.evidence.iter().map(|item| item.bytes.len()).sum()
    }

    /// Computes the content-derived proof hash for this request.
    ///
    /// Identical claims and evidence always produce the same digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn proof_hash(&self) -> Result<HashDigest, HashError> {
        let evidence = self
            .evidence
            .iter()
            .map(|item| EvidenceFingerprint {
                mime_type: &item.mime_type,
                sha256: hash_bytes(DEFAULT_HASH_ALGORITHM, &item.bytes).value,
            })
            .collect();
        let document = ProofDocument {
            claim: &self.claim,
            evidence,
        };
        hash_canonical_json(DEFAULT_HASH_ALGORITHM, &document)
    }
}

// ============================================================================
// SECTION: Oracle Verdict
// ============================================================================

/// Raw verdict returned by an attestation oracle.
///
/// # Invariants
/// - Untrusted; normalized by the attestation gate before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleVerdict {
    /// Whether the oracle accepts the evidence.
    pub is_valid: bool,
    /// Oracle confidence, nominally 0-100.
    pub confidence_score: f64,
    /// Oracle-supplied hash or anchor, informational only.
    #[serde(default)]
    pub proof_hash: Option<String>,
    /// Free-form analysis summary.
    #[serde(default)]
    pub analysis: String,
    /// Geographic label resolved from the evidence.
    #[serde(default)]
    pub geo_label: Option<String>,
    /// Forensic flags raised during analysis.
    #[serde(default)]
    pub flags: Vec<String>,
}

// ============================================================================
// SECTION: Attestation Result
// ============================================================================

/// Normalized attestation outcome produced by the gate.
///
/// # Invariants
/// - `confidence_score` is within 0-100.
/// - `proof_hash` is derived from the request content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationResult {
    /// Whether the evidence was accepted.
    pub is_valid: bool,
    /// Normalized confidence score.
    pub confidence_score: u8,
    /// Content-derived proof hash.
    pub proof_hash: HashDigest,
    /// Analysis summary reported by the oracle.
    pub analysis_summary: String,
    /// Geographic label reported by the oracle.
    pub geo_label: Option<String>,
    /// Forensic flags reported by the oracle.
    pub flags: Vec<String>,
    /// Oracle-supplied anchor retained for reference.
    pub oracle_anchor: Option<String>,
}

impl AttestationResult {
    /// Builds the structured record stored on an attested milestone.
    #[must_use]
    pub fn to_record(&self, attested_at: Timestamp) -> AttestationRecord {
        AttestationRecord {
            analysis_summary: self.analysis_summary.clone(),
            geo_label: self.geo_label.clone(),
            flags: self.flags.clone(),
            oracle_anchor: self.oracle_anchor.clone(),
            attested_at,
        }
    }
}

/// Attestation metadata stored on a submitted milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    /// Analysis summary reported by the oracle.
    pub analysis_summary: String,
    /// Geographic label reported by the oracle.
    pub geo_label: Option<String>,
    /// Forensic flags reported by the oracle.
    pub flags: Vec<String>,
    /// Oracle-supplied anchor retained for reference.
    pub oracle_anchor: Option<String>,
    /// Time the attestation was applied.
    pub attested_at: Timestamp,
}
