// crates/escrow-core/src/core/identifiers.rs
// ============================================================================
// Module: Quorum Escrow Identifiers
// Description: Canonical opaque identifiers for vaults, milestones, and actors.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Quorum
//! Escrow. Identifiers are opaque UTF-8 strings on the wire. Validator and
//! authority identities are always explicit parameters; there is no implicit
//! "current validator".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares an opaque string identifier newtype with the shared accessors.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_identifier! {
    /// Vault identifier assigned by the registry.
    ///
    /// # Invariants
    /// - Registry-assigned identifiers have the form `vault-<sequence>`.
    VaultId
}

string_identifier! {
    /// Milestone identifier, unique across all vaults.
    ///
    /// # Invariants
    /// - Registry-assigned identifiers have the form `<vault-id>/m<index>`.
    MilestoneId
}

string_identifier! {
    /// Validator identity used for quorum co-signatures.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; equality is exact byte equality.
    ValidatorId
}

string_identifier! {
    /// Owning authority (maker) of a vault.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; no normalization is applied.
    AuthorityId
}

string_identifier! {
    /// Settlement reference returned by the external ledger for a transfer.
    ///
    /// # Invariants
    /// - Opaque; only ever produced by a [`crate::SettlementLedger`].
    SettlementReference
}

/// Prefix used for registry-assigned vault identifiers.
const VAULT_ID_PREFIX: &str = "vault-";

impl VaultId {
    /// Builds the registry identifier for a sequence number.
    #[must_use]
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{VAULT_ID_PREFIX}{sequence}"))
    }

    /// Returns the sequence number for registry-assigned identifiers.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix(VAULT_ID_PREFIX).and_then(|raw| raw.parse().ok())
    }
}

impl MilestoneId {
    /// Builds the identifier of the milestone at `index` within `vault_id`.
    #[must_use]
    pub fn for_milestone(vault_id: &VaultId, index: u32) -> Self {
        Self(format!("{vault_id}/m{index}"))
    }
}
