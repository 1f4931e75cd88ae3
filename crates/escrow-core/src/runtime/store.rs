// crates/escrow-core/src/runtime/store.rs
// ============================================================================
// Module: Quorum Escrow In-Memory Store
// Description: Simple in-memory vault store for tests and local runs.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of [`VaultStore`]
//! for tests and local demos. Snapshots are lost when the process exits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::Vault;
use crate::core::VaultId;
use crate::interfaces::StoreError;
use crate::interfaces::VaultStore;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory vault store for tests and examples.
///
/// Clones share the same underlying map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryVaultStore {
    /// Vault snapshots protected by a mutex.
    vaults: Arc<Mutex<BTreeMap<VaultId, Vault>>>,
}

impl InMemoryVaultStore {
    /// Creates a new in-memory vault store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vaults: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Returns the number of stored snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        let guard = self
            .vaults
            .lock()
            .map_err(|_| StoreError::Store("vault store mutex poisoned".to_string()))?;
        Ok(guard.len())
    }

    /// Returns true when no snapshots are stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store mutex is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl VaultStore for InMemoryVaultStore {
    fn load_all(&self) -> Result<Vec<Vault>, StoreError> {
        let guard = self
            .vaults
            .lock()
            .map_err(|_| StoreError::Store("vault store mutex poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }

    fn save(&self, vault: &Vault) -> Result<(), StoreError> {
        self.vaults
            .lock()
            .map_err(|_| StoreError::Store("vault store mutex poisoned".to_string()))?
            .insert(vault.vault_id.clone(), vault.clone());
        Ok(())
    }
}
