// crates/escrow-core/src/runtime/engine.rs
// ============================================================================
// Module: Quorum Escrow Engine
// Description: Facade composing registry, gate, quorum, and settlement.
// Purpose: Expose the escrow consumer surface with one consistent code path.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The engine is the only entry point used by outer surfaces. Each operation
//! reads the vault, performs any blocking oracle or ledger call outside the
//! vault critical section, then re-enters the critical section to apply the
//! result through the state machine. State is re-validated on re-entry, so a
//! concurrent change between the two phases is detected rather than
//! overwritten. Every mutating operation records one audit event per outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::AttestationRequest;
use crate::core::DEFAULT_QUORUM_THRESHOLD;
use crate::core::Milestone;
use crate::core::MilestoneStatus;
use crate::core::PortfolioSummary;
use crate::core::ReviewItem;
use crate::core::SettlementKey;
use crate::core::SettlementReceipt;
use crate::core::Timestamp;
use crate::core::ValidatorId;
use crate::core::Vault;
use crate::core::VaultId;
use crate::core::VaultSpec;
use crate::core::VaultSummary;
use crate::interfaces::AttestationOracle;
use crate::interfaces::LedgerApproval;
use crate::interfaces::SettlementLedger;
use crate::interfaces::VaultStore;
use crate::runtime::audit::EscrowAuditEvent;
use crate::runtime::audit::EscrowAuditSink;
use crate::runtime::dispatcher::SettlementDispatcher;
use crate::runtime::error::EscrowError;
use crate::runtime::gate::AttestationGate;
use crate::runtime::gate::GateLimits;
use crate::runtime::machine::MilestoneStateMachine;
use crate::runtime::quorum::ApprovalOutcome;
use crate::runtime::quorum::QuorumLedger;
use crate::runtime::registry::VaultRegistry;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default deadline for oracle and ledger calls.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Default maximum evidence items per submission.
const DEFAULT_MAX_EVIDENCE_ITEMS: usize = 16;
/// Default maximum evidence bytes per submission (10 MiB).
const DEFAULT_MAX_EVIDENCE_BYTES: usize = 10 * 1024 * 1024;

/// Escrow engine configuration.
///
/// # Invariants
/// - `quorum_threshold >= 1`.
/// - `min_confidence <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Distinct validator approvals required for release.
    pub quorum_threshold: usize,
    /// Deadline for oracle calls; `None` waits indefinitely.
    pub oracle_timeout: Option<Duration>,
    /// Deadline for ledger calls; `None` waits indefinitely.
    pub ledger_timeout: Option<Duration>,
    /// Minimum normalized confidence accepted by the gate.
    pub min_confidence: u8,
    /// Maximum evidence items per submission.
    pub max_evidence_items: usize,
    /// Maximum total evidence bytes per submission.
    pub max_evidence_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quorum_threshold: DEFAULT_QUORUM_THRESHOLD,
            oracle_timeout: Some(DEFAULT_CALL_TIMEOUT),
            ledger_timeout: Some(DEFAULT_CALL_TIMEOUT),
            min_confidence: 0,
            max_evidence_items: DEFAULT_MAX_EVIDENCE_ITEMS,
            max_evidence_bytes: DEFAULT_MAX_EVIDENCE_BYTES,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Validation`] when a limit is out of range.
    pub fn validate(&self) -> Result<(), EscrowError> {
        if self.quorum_threshold == 0 {
            return Err(EscrowError::Validation("quorum threshold must be at least 1".to_string()));
        }
        if self.min_confidence > 100 {
            return Err(EscrowError::Validation("min confidence must be within 0-100".to_string()));
        }
        if self.max_evidence_items == 0 || self.max_evidence_bytes == 0 {
            return Err(EscrowError::Validation("evidence limits must be non-zero".to_string()));
        }
        if self.oracle_timeout.is_some_and(|timeout| timeout.is_zero())
            || self.ledger_timeout.is_some_and(|timeout| timeout.is_zero())
        {
            return Err(EscrowError::Validation("call timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Returns the gate limits derived from this configuration.
    #[must_use]
    pub const fn gate_limits(&self) -> GateLimits {
        GateLimits {
            max_evidence_items: self.max_evidence_items,
            max_evidence_bytes: self.max_evidence_bytes,
            min_confidence: self.min_confidence,
        }
    }
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Committed approval plus the outcome of forwarding it to the ledger.
///
/// Forwarding runs after the approval is committed, so a ledger failure here
/// never undoes the local approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalReceipt {
    /// Milestone state after the approval was committed.
    #[serde(flatten)]
    pub milestone: Milestone,
    /// True when the ledger accepted the co-signature.
    pub ledger_forwarded: bool,
    /// Forwarding failure reported by the ledger, if any.
    pub ledger_error: Option<String>,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Escrow engine composing the five runtime components.
pub struct EscrowEngine<O, L, S> {
    /// Vault registry and persistence.
    registry: VaultRegistry<S>,
    /// Attestation gate.
    gate: AttestationGate<O>,
    /// Quorum ledger.
    quorum: QuorumLedger,
    /// Settlement dispatcher.
    dispatcher: SettlementDispatcher<L>,
    /// Audit sink.
    audit: Arc<dyn EscrowAuditSink>,
}

impl<O, L, S> EscrowEngine<O, L, S>
where
    O: AttestationOracle + Send + Sync + 'static,
    L: SettlementLedger + Send + Sync + 'static,
    S: VaultStore,
{
    /// Creates an engine and restores every vault persisted in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Validation`] for invalid configuration and
    /// [`EscrowError::Store`] when persisted vaults cannot be restored.
    pub fn new(
        config: EngineConfig,
        oracle: Arc<O>,
        ledger: Arc<L>,
        store: S,
        audit: Arc<dyn EscrowAuditSink>,
    ) -> Result<Self, EscrowError> {
        config.validate()?;
        let quorum = QuorumLedger::new(config.quorum_threshold)?;
        let registry = VaultRegistry::open(store)?;
        let dispatcher = SettlementDispatcher::new(ledger, config.ledger_timeout);
        for vault in registry.list()? {
            for milestone in &vault.milestones {
                if let Some(receipt) = &milestone.settlement {
                    dispatcher.remember(
                        SettlementKey::new(vault.vault_id.clone(), milestone.index),
                        receipt.clone(),
                    )?;
                }
            }
        }
        Ok(Self {
            registry,
            gate: AttestationGate::new(oracle, config.oracle_timeout, config.gate_limits()),
            quorum,
            dispatcher,
            audit,
        })
    }

    /// Returns the configured quorum threshold.
    #[must_use]
    pub const fn quorum_threshold(&self) -> usize {
        self.quorum.threshold()
    }

    /// Reports store readiness.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when the store is unavailable.
    pub fn readiness(&self) -> Result<(), EscrowError> {
        self.registry.store().readiness().map_err(EscrowError::from)
    }

    // ------------------------------------------------------------------------
    // Mutating operations
    // ------------------------------------------------------------------------

    /// Creates a vault with all milestones pending.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Validation`] on invalid specs and
    /// [`EscrowError::Store`] when persistence fails.
    pub fn create_vault(&self, spec: VaultSpec) -> Result<Vault, EscrowError> {
        let authority = spec.authority.to_string();
        match self.registry.create_vault(spec) {
            Ok(vault) => {
                self.record(
                    EscrowAuditEvent::new("vault_created", Some(&vault.vault_id), None)
                        .with_actor(authority)
                        .with_detail(format!(
                            "total {} over {} milestones",
                            vault.total_amount,
                            vault.milestones.len()
                        )),
                );
                Ok(vault)
            }
            Err(err) => {
                self.record(
                    EscrowAuditEvent::new("vault_created", None, None)
                        .with_actor(authority)
                        .failed(&err),
                );
                Err(err)
            }
        }
    }

    /// Submits proof for a pending milestone.
    ///
    /// The oracle is consulted outside the vault critical section. A rejected
    /// or unavailable verdict leaves the milestone untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NotFound`], [`EscrowError::InvalidState`],
    /// [`EscrowError::Validation`], [`EscrowError::OracleUnavailable`],
    /// [`EscrowError::OracleRejected`], or [`EscrowError::Store`].
    pub fn submit_proof(
        &self,
        vault_id: &VaultId,
        index: u32,
        request: &AttestationRequest,
        attested_at: Timestamp,
    ) -> Result<Milestone, EscrowError> {
        let outcome = self.submit_proof_inner(vault_id, index, request, attested_at);
        match &outcome {
            Ok(milestone) => self.record(
                EscrowAuditEvent::new("proof_attested", Some(vault_id), Some(index)).with_detail(
                    format!(
                        "confidence {} proof {}",
                        milestone.confidence_score.unwrap_or_default(),
                        milestone
                            .proof_hash
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_default()
                    ),
                ),
            ),
            Err(err) => {
                let event = match err {
                    EscrowError::OracleRejected {
                        ..
                    } => "proof_rejected",
                    EscrowError::OracleUnavailable(_) => "oracle_unavailable",
                    EscrowError::InvalidState(_) => "invalid_state",
                    _ => "proof_submitted",
                };
                self.record(EscrowAuditEvent::new(event, Some(vault_id), Some(index)).failed(err));
            }
        }
        outcome
    }

    /// Records a validator approval and forwards it to the ledger.
    ///
    /// Approving twice is an idempotent no-op that re-forwards the signature.
    /// A forwarding failure is reported on the returned [`ApprovalReceipt`]
    /// and audited as `ledger_failure`; the committed approval stands.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Validation`] for empty validator identities,
    /// [`EscrowError::NotFound`], [`EscrowError::InvalidState`], or
    /// [`EscrowError::Store`].
    pub fn approve_milestone(
        &self,
        vault_id: &VaultId,
        index: u32,
        validator: &ValidatorId,
    ) -> Result<ApprovalReceipt, EscrowError> {
        if validator.as_str().trim().is_empty() {
            let err = EscrowError::Validation("validator identity must not be empty".to_string());
            self.record(
                EscrowAuditEvent::new("approval_recorded", Some(vault_id), Some(index))
                    .failed(&err),
            );
            return Err(err);
        }
        let applied = self.registry.update(vault_id, |vault| {
            let milestone = milestone_mut(vault, index)?;
            let outcome = self.quorum.approve(milestone, validator)?;
            Ok((outcome, milestone.clone()))
        });
        let (outcome, milestone) = match applied {
            Ok(applied) => applied,
            Err(err) => {
                let event = if matches!(err, EscrowError::InvalidState(_)) {
                    "invalid_state"
                } else {
                    "approval_recorded"
                };
                self.record(
                    EscrowAuditEvent::new(event, Some(vault_id), Some(index))
                        .with_actor(validator.to_string())
                        .failed(&err),
                );
                return Err(err);
            }
        };

        let approval_event =
            EscrowAuditEvent::new("approval_recorded", Some(vault_id), Some(index))
                .with_actor(validator.to_string())
                .with_detail(format!("approvals {}", outcome.approvals()));
        self.record(if outcome.is_new() { approval_event } else { approval_event.noop() });
        if let ApprovalOutcome::QuorumReached(count) = outcome {
            self.record(
                EscrowAuditEvent::new("quorum_reached", Some(vault_id), Some(index))
                    .with_actor(validator.to_string())
                    .with_detail(format!("approvals {count} of {}", self.quorum.threshold())),
            );
        }

        let forwarded = self
            .dispatcher
            .forward_approval(&LedgerApproval {
                vault_id: vault_id.clone(),
                milestone_index: index,
                validator_id: validator.clone(),
            })
            .and_then(|accepted| {
                if accepted {
                    Ok(())
                } else {
                    Err(EscrowError::LedgerFailure("ledger declined co-signature".to_string()))
                }
            });
        let ledger_error = match forwarded {
            Ok(()) => None,
            Err(err) => {
                self.record(
                    EscrowAuditEvent::new("ledger_failure", Some(vault_id), Some(index))
                        .with_actor(validator.to_string())
                        .failed(&err),
                );
                Some(err.to_string())
            }
        };
        Ok(ApprovalReceipt {
            milestone,
            ledger_forwarded: ledger_error.is_none(),
            ledger_error,
        })
    }

    /// Releases a releasable milestone's funds at most once.
    ///
    /// Releasing an already released milestone returns the original receipt
    /// without a new ledger transfer.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NotFound`], [`EscrowError::InvalidState`],
    /// [`EscrowError::LedgerFailure`], [`EscrowError::AlreadyReleased`] when
    /// the ledger and local state disagree, or [`EscrowError::Store`].
    pub fn release_milestone(
        &self,
        vault_id: &VaultId,
        index: u32,
    ) -> Result<SettlementReceipt, EscrowError> {
        let outcome = self.release_milestone_inner(vault_id, index);
        match &outcome {
            Ok((receipt, fresh)) => {
                let event =
                    EscrowAuditEvent::new("milestone_released", Some(vault_id), Some(index))
                        .with_detail(format!(
                            "amount {} reference {}",
                            receipt.amount, receipt.reference
                        ));
                self.record(if *fresh { event } else { event.noop() });
            }
            Err(err) => {
                let event = match err {
                    EscrowError::AlreadyReleased {
                        ..
                    } => "protocol_violation",
                    EscrowError::LedgerFailure(_) => "ledger_failure",
                    EscrowError::InvalidState(_) => "invalid_state",
                    _ => "milestone_released",
                };
                self.record(EscrowAuditEvent::new(event, Some(vault_id), Some(index)).failed(err));
            }
        }
        outcome.map(|(receipt, _)| receipt)
    }

    // ------------------------------------------------------------------------
    // Read operations
    // ------------------------------------------------------------------------

    /// Returns a snapshot of a vault.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NotFound`] for unknown vaults.
    pub fn vault_state(&self, vault_id: &VaultId) -> Result<Vault, EscrowError> {
        self.registry.get(vault_id)
    }

    /// Returns snapshots of all vaults.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when a lock is poisoned.
    pub fn list_vaults(&self) -> Result<Vec<Vault>, EscrowError> {
        self.registry.list()
    }

    /// Returns the project summary for a vault.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NotFound`] for unknown vaults.
    pub fn vault_summary(&self, vault_id: &VaultId) -> Result<VaultSummary, EscrowError> {
        self.registry.get(vault_id).map(|vault| VaultSummary::from_vault(&vault))
    }

    /// Returns the portfolio rollup across all vaults.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when a lock is poisoned.
    pub fn portfolio_summary(&self) -> Result<PortfolioSummary, EscrowError> {
        Ok(PortfolioSummary::from_vaults(&self.registry.list()?))
    }

    /// Returns submitted milestones awaiting co-signatures.
    ///
    /// With `unsigned_only`, milestones already signed by `validator` are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when a lock is poisoned.
    pub fn review_queue(
        &self,
        validator: Option<&ValidatorId>,
        unsigned_only: bool,
    ) -> Result<Vec<ReviewItem>, EscrowError> {
        let vaults = self.registry.list()?;
        Ok(vaults
            .iter()
            .flat_map(|vault| {
                vault
                    .milestones
                    .iter()
                    .filter_map(|milestone| ReviewItem::for_milestone(vault, milestone, validator))
            })
            .filter(|item| !(unsigned_only && item.signed_by_validator))
            .collect())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Evaluates proof outside the critical section, then applies it.
    fn submit_proof_inner(
        &self,
        vault_id: &VaultId,
        index: u32,
        request: &AttestationRequest,
        attested_at: Timestamp,
    ) -> Result<Milestone, EscrowError> {
        let vault = self.registry.get(vault_id)?;
        let milestone = milestone_ref(&vault, index)?;
        if milestone.status != MilestoneStatus::Pending {
            return Err(EscrowError::InvalidState(format!(
                "cannot submit proof for milestone {}: status is {}",
                milestone.milestone_id,
                milestone.status.as_str()
            )));
        }
        let result = self.gate.evaluate(request)?;
        self.registry.update(vault_id, |vault| {
            let milestone = milestone_mut(vault, index)?;
            MilestoneStateMachine::apply_attestation(milestone, &result, attested_at)?;
            Ok(milestone.clone())
        })
    }

    /// Dispatches the ledger transfer, then applies the receipt.
    ///
    /// Returns the receipt and whether this call released the milestone.
    fn release_milestone_inner(
        &self,
        vault_id: &VaultId,
        index: u32,
    ) -> Result<(SettlementReceipt, bool), EscrowError> {
        let vault = self.registry.get(vault_id)?;
        let milestone = milestone_ref(&vault, index)?;
        if milestone.status == MilestoneStatus::Released {
            let receipt = milestone.settlement.clone().ok_or_else(|| {
                EscrowError::Store(format!(
                    "released milestone {} has no settlement receipt",
                    milestone.milestone_id
                ))
            })?;
            return Ok((receipt, false));
        }
        let key = SettlementKey::new(vault_id.clone(), index);
        let receipt = self.dispatcher.release(&key, milestone.amount, milestone.status)?;
        self.registry.update(vault_id, |vault| {
            let current = milestone_ref(vault, index)?;
            if current.status == MilestoneStatus::Released {
                return match &current.settlement {
                    Some(existing) if existing.reference == receipt.reference => {
                        Ok((existing.clone(), false))
                    }
                    _ => Err(EscrowError::AlreadyReleased {
                        vault_id: vault_id.clone(),
                        index,
                    }),
                };
            }
            MilestoneStateMachine::apply_release(vault, index, receipt.clone())?;
            Ok((receipt.clone(), true))
        })
    }

    /// Forwards an audit event to the sink.
    fn record(&self, event: EscrowAuditEvent) {
        self.audit.record(&event);
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the milestone at `index` or a not-found error.
fn milestone_ref(vault: &Vault, index: u32) -> Result<&Milestone, EscrowError> {
    vault.milestone(index).ok_or_else(|| {
        EscrowError::NotFound(format!("milestone {index} of vault {}", vault.vault_id))
    })
}

/// Returns the mutable milestone at `index` or a not-found error.
fn milestone_mut(vault: &mut Vault, index: u32) -> Result<&mut Milestone, EscrowError> {
    let vault_id = vault.vault_id.clone();
    vault
        .milestone_mut(index)
        .ok_or_else(|| EscrowError::NotFound(format!("milestone {index} of vault {vault_id}")))
}
