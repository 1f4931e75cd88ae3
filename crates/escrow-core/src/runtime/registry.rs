// crates/escrow-core/src/runtime/registry.rs
// ============================================================================
// Module: Quorum Escrow Vault Registry
// Description: Owned set of vaults with one critical section per vault.
// Purpose: Centralize vault mutation, invariant checks, and persistence.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The registry is the single point of truth for vault state. Vaults live in a
//! read-write-locked map; each vault sits behind its own mutex so transitions
//! on one vault serialize while other vaults proceed in parallel.
//!
//! Mutations are transactional: [`VaultRegistry::update`] clones the vault,
//! applies the change to the copy, re-checks the accounting invariants,
//! persists the copy, and only then replaces the live vault. A failure at any
//! step leaves the live vault untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::core::MAX_MILESTONES;
use crate::core::Milestone;
use crate::core::MilestoneId;
use crate::core::MilestoneStatus;
use crate::core::Vault;
use crate::core::VaultId;
use crate::core::VaultSpec;
use crate::core::vault::split_amount;
use crate::interfaces::VaultStore;
use crate::runtime::error::EscrowError;

// ============================================================================
// SECTION: Vault Registry
// ============================================================================

/// Shared handle to a single vault's critical section.
type VaultCell = Arc<Mutex<Vault>>;

/// Owned set of vaults backed by a [`VaultStore`].
///
/// # Invariants
/// - Every live vault satisfies [`Vault::check_invariants`].
/// - Every live vault has been persisted in its current form.
/// - Assigned sequence numbers are strictly increasing.
pub struct VaultRegistry<S> {
    /// Vault cells keyed by identifier.
    vaults: RwLock<BTreeMap<VaultId, VaultCell>>,
    /// Next sequence number for vault identifiers.
    next_sequence: AtomicU64,
    /// Persistence backend.
    store: S,
}

impl<S> VaultRegistry<S>
where
    S: VaultStore,
{
    /// Creates an empty registry without loading persisted vaults.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            vaults: RwLock::new(BTreeMap::new()),
            next_sequence: AtomicU64::new(1),
            store,
        }
    }

    /// Opens a registry seeded with every vault persisted in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when loading fails or persisted data is corrupt.
    pub fn open(store: S) -> Result<Self, EscrowError> {
        let vaults = store.load_all()?;
        let registry = Self::new(store);
        registry.restore(vaults)?;
        Ok(registry)
    }

    /// Returns the persistence backend.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Seeds the registry with previously persisted vaults.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when a vault fails its invariants or
    /// duplicates an identifier already present.
    pub fn restore(&self, vaults: Vec<Vault>) -> Result<(), EscrowError> {
        let mut map = self.write_map()?;
        let mut highest = 0;
        for vault in vaults {
            vault
                .check_invariants()
                .map_err(|err| EscrowError::Store(format!("corrupt vault snapshot: {err}")))?;
            if map.contains_key(&vault.vault_id) {
                return Err(EscrowError::Store(format!(
                    "duplicate vault snapshot: {}",
                    vault.vault_id
                )));
            }
            highest = highest.max(vault.vault_id.sequence().unwrap_or(0));
            map.insert(vault.vault_id.clone(), Arc::new(Mutex::new(vault)));
        }
        self.next_sequence.fetch_max(highest.saturating_add(1), Ordering::SeqCst);
        Ok(())
    }

    /// Validates a spec and creates a new vault with all milestones pending.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Validation`] on violated constraints and
    /// [`EscrowError::Store`] when persistence fails.
    pub fn create_vault(&self, spec: VaultSpec) -> Result<Vault, EscrowError> {
        let shares = validate_spec(&spec)?;
        let vault_id = VaultId::from_sequence(self.next_sequence.fetch_add(1, Ordering::SeqCst));
        let milestones = shares
            .into_iter()
            .zip(0_u32..)
            .map(|(amount, index)| Milestone {
                milestone_id: MilestoneId::for_milestone(&vault_id, index),
                index,
                description: spec
                    .milestone_descriptions
                    .get(index as usize)
                    .cloned()
                    .unwrap_or_else(|| format!("Milestone #{} for {}", index + 1, spec.name)),
                amount,
                proof_hash: None,
                approvals: BTreeSet::new(),
                status: MilestoneStatus::Pending,
                confidence_score: None,
                attestation: None,
                settlement: None,
            })
            .collect();
        let vault = Vault {
            vault_id: vault_id.clone(),
            name: spec.name,
            description: spec.description,
            authority: spec.authority,
            category: spec.category,
            location: spec.location,
            total_amount: spec.total_amount,
            released_amount: 0,
            milestones,
            created_at: spec.created_at,
        };
        vault.check_invariants().map_err(EscrowError::Validation)?;

        let mut map = self.write_map()?;
        if map.contains_key(&vault_id) {
            return Err(EscrowError::Store(format!("vault identifier collision: {vault_id}")));
        }
        self.store.save(&vault)?;
        map.insert(vault_id, Arc::new(Mutex::new(vault.clone())));
        Ok(vault)
    }

    /// Returns a snapshot of a vault.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NotFound`] for unknown vaults.
    pub fn get(&self, vault_id: &VaultId) -> Result<Vault, EscrowError> {
        let cell = self.cell(vault_id)?;
        let guard = cell
            .lock()
            .map_err(|_| EscrowError::Store(format!("vault {vault_id} mutex poisoned")))?;
        Ok(guard.clone())
    }

    /// Returns snapshots of all vaults ordered by sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Store`] when a lock is poisoned.
    pub fn list(&self) -> Result<Vec<Vault>, EscrowError> {
        let cells: Vec<VaultCell> = self.read_map()?.values().cloned().collect();
        let mut vaults = cells
            .iter()
            .map(|cell| {
                cell.lock()
                    .map(|guard| guard.clone())
                    .map_err(|_| EscrowError::Store("vault mutex poisoned".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        vaults.sort_by(|left, right| {
            (left.vault_id.sequence(), &left.vault_id)
                .cmp(&(right.vault_id.sequence(), &right.vault_id))
        });
        Ok(vaults)
    }

    /// Applies a transactional mutation inside the vault's critical section.
    ///
    /// The closure works on a copy; the copy replaces the live vault only when
    /// the closure succeeds, the invariants hold, and the store accepts it.
    /// Closures returning without changes skip persistence.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, [`EscrowError::NotFound`] for unknown
    /// vaults, [`EscrowError::InvalidState`] when invariants would break, or
    /// [`EscrowError::Store`] when persistence fails.
    pub fn update<R, F>(&self, vault_id: &VaultId, mutate: F) -> Result<R, EscrowError>
    where
        F: FnOnce(&mut Vault) -> Result<R, EscrowError>,
    {
        let cell = self.cell(vault_id)?;
        let mut guard = cell
            .lock()
            .map_err(|_| EscrowError::Store(format!("vault {vault_id} mutex poisoned")))?;
        let mut working = guard.clone();
        let output = mutate(&mut working)?;
        if working == *guard {
            return Ok(output);
        }
        working.check_invariants().map_err(|err| {
            EscrowError::InvalidState(format!("transition would violate invariants: {err}"))
        })?;
        self.store.save(&working)?;
        *guard = working;
        Ok(output)
    }

    /// Returns the cell for a vault.
    fn cell(&self, vault_id: &VaultId) -> Result<VaultCell, EscrowError> {
        self.read_map()?
            .get(vault_id)
            .cloned()
            .ok_or_else(|| EscrowError::NotFound(format!("vault {vault_id}")))
    }

    /// Acquires the map read lock.
    fn read_map(&self) -> Result<RwLockReadGuard<'_, BTreeMap<VaultId, VaultCell>>, EscrowError> {
        self.vaults
            .read()
            .map_err(|_| EscrowError::Store("vault registry lock poisoned".to_string()))
    }

    /// Acquires the map write lock.
    fn write_map(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<VaultId, VaultCell>>, EscrowError> {
        self.vaults
            .write()
            .map_err(|_| EscrowError::Store("vault registry lock poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a vault spec and returns the milestone amounts.
fn validate_spec(spec: &VaultSpec) -> Result<Vec<u64>, EscrowError> {
    if spec.name.trim().is_empty() {
        return Err(EscrowError::Validation("vault name must not be empty".to_string()));
    }
    if spec.authority.as_str().trim().is_empty() {
        return Err(EscrowError::Validation("vault authority must not be empty".to_string()));
    }
    if spec.total_amount == 0 {
        return Err(EscrowError::Validation("total amount must be greater than zero".to_string()));
    }
    if spec.milestone_count == 0 || spec.milestone_count > MAX_MILESTONES {
        return Err(EscrowError::Validation(format!(
            "milestone count must be between 1 and {MAX_MILESTONES}, got {}",
            spec.milestone_count
        )));
    }
    if !spec.milestone_descriptions.is_empty()
        && spec.milestone_descriptions.len() != spec.milestone_count as usize
    {
        return Err(EscrowError::Validation(format!(
            "expected {} milestone descriptions, got {}",
            spec.milestone_count,
            spec.milestone_descriptions.len()
        )));
    }
    let shares = split_amount(spec.total_amount, spec.milestone_count)
        .ok_or_else(|| EscrowError::Validation("milestone count must be positive".to_string()))?;
    if shares.contains(&0) {
        return Err(EscrowError::Validation(format!(
            "total amount {} is too small for {} milestones",
            spec.total_amount, spec.milestone_count
        )));
    }
    Ok(shares)
}
