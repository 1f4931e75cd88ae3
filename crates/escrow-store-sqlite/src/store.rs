// crates/escrow-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Vault Store
// Description: Durable VaultStore backed by SQLite WAL.
// Purpose: Persist vault snapshots with deterministic serialization.
// Dependencies: escrow-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`VaultStore`] using `SQLite`. Each save
//! produces a canonical JSON snapshot stored in an append-only version table
//! and advances the vault's latest version pointer. Loads verify integrity via
//! stored hashes and fail closed on corruption.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use escrow_core::StoreError;
use escrow_core::Vault;
use escrow_core::VaultId;
use escrow_core::VaultStore;
use escrow_core::hashing::DEFAULT_HASH_ALGORITHM;
use escrow_core::hashing::HashAlgorithm;
use escrow_core::hashing::canonical_json_bytes;
use escrow_core::hashing::hash_bytes;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms) for `SQLite` connections.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum canonical snapshot size accepted on save and load.
pub const MAX_VAULT_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` vault store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `max_versions`, when set, must be greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Optional maximum snapshots kept per vault (older versions pruned).
    #[serde(default)]
    pub max_versions: Option<u64>,
}

impl SqliteStoreConfig {
    /// Builds a configuration with defaults for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_versions: None,
        }
    }

    /// Validates path safety and limits.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the configuration is unsafe.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        validate_store_path(&self.path)?;
        if self.max_versions == Some(0) {
            return Err(SqliteStoreError::Invalid(
                "max_versions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw vault payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Snapshot exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "vault_json exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Metadata for one stored vault snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultVersionSummary {
    /// Snapshot version, starting at 1.
    pub version: i64,
    /// Stored snapshot hash.
    pub vault_hash: String,
    /// Save time in unix milliseconds.
    pub saved_at: i64,
}

/// `SQLite`-backed vault store with WAL support.
///
/// # Invariants
/// - Loads verify stored hashes before deserialization.
/// - Connection access is serialized through a mutex.
#[derive(Clone)]
pub struct SqliteVaultStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteVaultStore {
    /// Opens an `SQLite`-backed vault store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Lists stored snapshot versions for a vault, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn list_versions(
        &self,
        vault_id: &VaultId,
    ) -> Result<Vec<VaultVersionSummary>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT version, vault_hash, saved_at FROM vault_versions WHERE vault_id = ?1 \
                 ORDER BY version ASC",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![vault_id.as_str()], |row| {
                Ok(VaultVersionSummary {
                    version: row.get(0)?,
                    vault_hash: row.get(1)?,
                    saved_at: row.get(2)?,
                })
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Writes one snapshot and advances the latest version pointer.
    fn save_vault(&self, vault: &Vault) -> Result<(), SqliteStoreError> {
        let vault_json =
            canonical_json_bytes(vault).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if vault_json.len() > MAX_VAULT_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_VAULT_BYTES,
                actual_bytes: vault_json.len(),
            });
        }
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &vault_json);
        let vault_id = vault.vault_id.as_str();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let latest_version: Option<i64> = tx
            .query_row(
                "SELECT latest_version FROM vaults WHERE vault_id = ?1",
                params![vault_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let next_version = match latest_version {
            None => 1,
            Some(value) if value < 1 => {
                return Err(SqliteStoreError::Corrupt(format!(
                    "invalid latest_version for vault {vault_id}"
                )));
            }
            Some(value) => value.checked_add(1).ok_or_else(|| {
                SqliteStoreError::Corrupt(format!("vault version overflow for vault {vault_id}"))
            })?,
        };
        tx.execute(
            "INSERT INTO vaults (vault_id, latest_version) VALUES (?1, ?2) ON CONFLICT(vault_id) \
             DO UPDATE SET latest_version = excluded.latest_version",
            params![vault_id, next_version],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.execute(
            "INSERT INTO vault_versions (vault_id, version, vault_json, vault_hash, \
             hash_algorithm, saved_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                vault_id,
                next_version,
                vault_json.as_slice(),
                digest.value.as_str(),
                hash_algorithm_label(digest.algorithm),
                unix_millis()
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        enforce_retention(&tx, vault_id, next_version, self.config.max_versions)?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Loads and verifies the latest snapshot of every vault.
    fn load_vaults(&self) -> Result<Vec<Vault>, SqliteStoreError> {
        let payloads = {
            let guard = self.lock()?;
            let mut stmt = guard
                .prepare(
                    "SELECT v.vault_id, v.latest_version, length(vv.vault_json), vv.vault_json, \
                     vv.vault_hash, vv.hash_algorithm FROM vaults v LEFT JOIN vault_versions vv \
                     ON vv.vault_id = v.vault_id AND vv.version = v.latest_version ORDER BY \
                     v.vault_id ASC",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(VaultPayload {
                        vault_id: row.get(0)?,
                        latest_version: row.get(1)?,
                        length: row.get(2)?,
                        bytes: row.get(3)?,
                        hash_value: row.get(4)?,
                        hash_algorithm: row.get(5)?,
                    })
                })
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?
        };
        payloads.into_iter().map(VaultPayload::verify).collect()
    }

    /// Verifies the store can execute a simple SQL statement.
    fn check_connection(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }
}

impl VaultStore for SqliteVaultStore {
    fn load_all(&self) -> Result<Vec<Vault>, StoreError> {
        self.load_vaults().map_err(StoreError::from)
    }

    fn save(&self, vault: &Vault) -> Result<(), StoreError> {
        self.save_vault(vault).map_err(StoreError::from)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.check_connection().map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Raw row for the latest snapshot of a vault.
struct VaultPayload {
    /// Vault identifier key.
    vault_id: String,
    /// Latest version pointer.
    latest_version: i64,
    /// Stored payload length, absent when the version row is missing.
    length: Option<i64>,
    /// Stored JSON bytes.
    bytes: Option<Vec<u8>>,
    /// Stored hash value.
    hash_value: Option<String>,
    /// Stored hash algorithm label.
    hash_algorithm: Option<String>,
}

impl VaultPayload {
    /// Checks hash and key consistency, then decodes the snapshot.
    fn verify(self) -> Result<Vault, SqliteStoreError> {
        let vault_id = self.vault_id;
        let (Some(length), Some(bytes), Some(hash_value), Some(hash_algorithm)) =
            (self.length, self.bytes, self.hash_value, self.hash_algorithm)
        else {
            return Err(SqliteStoreError::Corrupt(format!(
                "missing vault version {} for vault {vault_id}",
                self.latest_version
            )));
        };
        let length = usize::try_from(length).map_err(|_| {
            SqliteStoreError::Invalid(format!("negative vault length for vault {vault_id}"))
        })?;
        if length > MAX_VAULT_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_VAULT_BYTES,
                actual_bytes: length,
            });
        }
        let algorithm = parse_hash_algorithm(&hash_algorithm)?;
        let expected = hash_bytes(algorithm, &bytes);
        if expected.value != hash_value {
            return Err(SqliteStoreError::Corrupt(format!("hash mismatch for vault {vault_id}")));
        }
        let vault: Vault = serde_json::from_slice(&bytes)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if vault.vault_id.as_str() != vault_id {
            return Err(SqliteStoreError::Invalid(
                "vault_id mismatch between key and payload".to_string(),
            ));
        }
        Ok(vault)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS vaults (
                    vault_id TEXT NOT NULL PRIMARY KEY,
                    latest_version INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS vault_versions (
                    vault_id TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    vault_json BLOB NOT NULL,
                    vault_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    saved_at INTEGER NOT NULL,
                    PRIMARY KEY (vault_id, version),
                    FOREIGN KEY (vault_id) REFERENCES vaults(vault_id) ON DELETE CASCADE
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Enforces version retention if configured.
fn enforce_retention(
    tx: &rusqlite::Transaction<'_>,
    vault_id: &str,
    latest_version: i64,
    max_versions: Option<u64>,
) -> Result<(), SqliteStoreError> {
    let Some(max_versions) = max_versions else {
        return Ok(());
    };
    let max_versions = i64::try_from(max_versions)
        .map_err(|_| SqliteStoreError::Invalid("max_versions too large".to_string()))?;
    if latest_version > max_versions {
        let min_version = latest_version - max_versions + 1;
        tx.execute(
            "DELETE FROM vault_versions WHERE vault_id = ?1 AND version < ?2",
            params![vault_id, min_version],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

/// Returns the canonical hash algorithm label.
const fn hash_algorithm_label(algorithm: HashAlgorithm) -> &'static str {
    match algorithm {
        HashAlgorithm::Sha256 => "sha256",
    }
}

/// Parses a hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    match label {
        "sha256" => Ok(HashAlgorithm::Sha256),
        other => Err(SqliteStoreError::Invalid(format!("unsupported hash algorithm: {other}"))),
    }
}
