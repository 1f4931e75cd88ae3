// crates/escrow-core/src/runtime/dispatcher.rs
// ============================================================================
// Module: Quorum Escrow Settlement Dispatcher
// Description: Idempotent release and co-signature calls to the ledger.
// Purpose: Guarantee at most one ledger transfer per milestone.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Each `(vault_id, milestone_index)` key owns a settlement slot. Releasers of
//! the same key queue on the slot; the first performs the ledger transfer and
//! records the receipt, later ones receive the cached receipt. The slot is
//! separate from the vault critical section so ledger latency never blocks
//! approvals or reads.
//!
//! A transfer that completes after its deadline still records its receipt,
//! so a retry converges on the original reference instead of a second
//! transfer. Until that worker finishes the key stays marked in flight and
//! retries fail with a retryable [`EscrowError::LedgerFailure`]. Every
//! ledger call carries the key's deterministic idempotency key so the ledger
//! can deduplicate across restarts.
//!
//! Slots are retired once the key's receipt is cached; later releasers are
//! answered from the cache.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use crate::core::MilestoneStatus;
use crate::core::SettlementKey;
use crate::core::SettlementReceipt;
use crate::interfaces::LedgerApproval;
use crate::interfaces::LedgerError;
use crate::interfaces::LedgerRelease;
use crate::interfaces::SettlementLedger;
use crate::runtime::deadline::call_with_deadline;
use crate::runtime::error::EscrowError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Receipts keyed by settlement key.
type ReceiptCache = Arc<Mutex<BTreeMap<SettlementKey, SettlementReceipt>>>;
/// Keys whose ledger transfer is still running.
type InFlightKeys = Arc<Mutex<BTreeSet<SettlementKey>>>;

/// Marks a key in flight until the owning transfer finishes or is dropped.
struct InFlightMark {
    /// Shared in-flight set.
    keys: InFlightKeys,
    /// Key held by this mark.
    key: SettlementKey,
}

impl Drop for InFlightMark {
    fn drop(&mut self) {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

/// Settlement dispatcher enforcing at-most-once ledger transfers.
pub struct SettlementDispatcher<L> {
    /// Ledger implementation shared with deadline workers.
    ledger: Arc<L>,
    /// Optional ledger call deadline.
    timeout: Option<Duration>,
    /// Completed settlement receipts.
    receipts: ReceiptCache,
    /// Transfers still running, including ones abandoned at their deadline.
    in_flight: InFlightKeys,
    /// Per-key settlement slots.
    slots: Mutex<BTreeMap<SettlementKey, Arc<Mutex<()>>>>,
}

impl<L> SettlementDispatcher<L>
where
    L: SettlementLedger + Send + Sync + 'static,
{
    /// Creates a new settlement dispatcher.
    #[must_use]
    pub fn new(ledger: Arc<L>, timeout: Option<Duration>) -> Self {
        Self {
            ledger,
            timeout,
            receipts: Arc::new(Mutex::new(BTreeMap::new())),
            in_flight: Arc::new(Mutex::new(BTreeSet::new())),
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Releases the funds for a milestone at most once.
    ///
    /// `observed` is the milestone status read by the caller before dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::AlreadyReleased`] when the milestone is already
    /// released or the ledger reports the transfer as settled,
    /// [`EscrowError::InvalidState`] when the milestone is not releasable, and
    /// [`EscrowError::LedgerFailure`] on transport errors, deadline expiry, or
    /// while an earlier transfer for the key is still running.
    pub fn release(
        &self,
        key: &SettlementKey,
        amount: u64,
        observed: MilestoneStatus,
    ) -> Result<SettlementReceipt, EscrowError> {
        match observed {
            MilestoneStatus::Releasable => {}
            MilestoneStatus::Released => {
                return Err(EscrowError::AlreadyReleased {
                    vault_id: key.vault_id.clone(),
                    index: key.milestone_index,
                });
            }
            MilestoneStatus::Pending | MilestoneStatus::Submitted => {
                return Err(EscrowError::InvalidState(format!(
                    "cannot release milestone {} of vault {}: status is {}",
                    key.milestone_index,
                    key.vault_id,
                    observed.as_str()
                )));
            }
        }

        let slot = self.slot(key)?;
        let _held = slot
            .lock()
            .map_err(|_| EscrowError::Store("settlement slot mutex poisoned".to_string()))?;
        if let Some(receipt) = self.cached_receipt(key)? {
            self.retire_slot(key)?;
            return Ok(receipt);
        }
        let mark = self.mark_in_flight(key)?;

        let instruction = LedgerRelease {
            key: key.clone(),
            amount,
            idempotency_key: key.idempotency_key()?,
        };
        let ledger = Arc::clone(&self.ledger);
        let receipts = Arc::clone(&self.receipts);
        let outcome = call_with_deadline("ledger", self.timeout, move || {
            // Dropped last, after the receipt is cached.
            let _mark = mark;
            let reference = ledger.release(&instruction)?;
            let receipt = SettlementReceipt {
                reference,
                amount: instruction.amount,
                idempotency_key: instruction.idempotency_key,
            };
            if let Ok(mut cache) = receipts.lock() {
                cache.insert(instruction.key, receipt.clone());
            }
            Ok::<_, LedgerError>(receipt)
        })
        .map_err(|err| EscrowError::LedgerFailure(err.describe("ledger release")))?;

        let receipt = outcome.map_err(|err| match err {
            LedgerError::AlreadySettled(_) => EscrowError::AlreadyReleased {
                vault_id: key.vault_id.clone(),
                index: key.milestone_index,
            },
            LedgerError::Transport(_) | LedgerError::Rejected(_) => {
                EscrowError::LedgerFailure(err.to_string())
            }
        })?;
        self.retire_slot(key)?;
        Ok(receipt)
    }

    /// Forwards a validator co-signature to the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::LedgerFailure`] on transport errors, rejection,
    /// or deadline expiry.
    pub fn forward_approval(&self, approval: &LedgerApproval) -> Result<bool, EscrowError> {
        let ledger = Arc::clone(&self.ledger);
        let owned = approval.clone();
        call_with_deadline("ledger", self.timeout, move || ledger.approve(&owned))
            .map_err(|err| EscrowError::LedgerFailure(err.describe("ledger approve")))?
            .map_err(|err| EscrowError::LedgerFailure(err.to_string()))
    }

    /// Returns the cached receipt for a key, if a transfer completed.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when the cache mutex is poisoned.
    pub fn cached_receipt(
        &self,
        key: &SettlementKey,
    ) -> Result<Option<SettlementReceipt>, EscrowError> {
        let cache = self
            .receipts
            .lock()
            .map_err(|_| EscrowError::Store("settlement receipt cache poisoned".to_string()))?;
        Ok(cache.get(key).cloned())
    }

    /// Seeds the receipt cache with a receipt recorded on a persisted vault.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when the cache mutex is poisoned.
    pub fn remember(
        &self,
        key: SettlementKey,
        receipt: SettlementReceipt,
    ) -> Result<(), EscrowError> {
        self.receipts
            .lock()
            .map_err(|_| EscrowError::Store("settlement receipt cache poisoned".to_string()))?
            .entry(key)
            .or_insert(receipt);
        Ok(())
    }

    /// Returns the number of settlement slots currently held.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when the slot map mutex is poisoned.
    pub fn open_slots(&self) -> Result<usize, EscrowError> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| EscrowError::Store("settlement slot map poisoned".to_string()))?;
        Ok(slots.len())
    }

    /// Marks a key in flight, failing when a transfer for it is still running.
    fn mark_in_flight(&self, key: &SettlementKey) -> Result<InFlightMark, EscrowError> {
        let mut keys = self
            .in_flight
            .lock()
            .map_err(|_| EscrowError::Store("settlement in-flight set poisoned".to_string()))?;
        if !keys.insert(key.clone()) {
            return Err(EscrowError::LedgerFailure(format!(
                "ledger release for milestone {} of vault {} is still in flight",
                key.milestone_index, key.vault_id
            )));
        }
        Ok(InFlightMark {
            keys: Arc::clone(&self.in_flight),
            key: key.clone(),
        })
    }

    /// Drops the slot of a key whose receipt is cached.
    fn retire_slot(&self, key: &SettlementKey) -> Result<(), EscrowError> {
        self.slots
            .lock()
            .map_err(|_| EscrowError::Store("settlement slot map poisoned".to_string()))?
            .remove(key);
        Ok(())
    }

    /// Returns the settlement slot for a key, creating it on first use.
    fn slot(&self, key: &SettlementKey) -> Result<Arc<Mutex<()>>, EscrowError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| EscrowError::Store("settlement slot map poisoned".to_string()))?;
        Ok(Arc::clone(slots.entry(key.clone()).or_default()))
    }
}
