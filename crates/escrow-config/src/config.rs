// crates/escrow-config/src/config.rs
// ============================================================================
// Module: Quorum Escrow Configuration
// Description: Configuration loading and validation for the escrow stack.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: escrow-core, escrow-providers, escrow-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path comes from the caller, then the `ESCROW_CONFIG` environment
//! variable, then `escrow.toml` in the working directory. Unknown keys and
//! out-of-range values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use escrow_core::EngineConfig;
use escrow_providers::HttpClientConfig;
use escrow_store_sqlite::SqliteStoreConfig;
use escrow_store_sqlite::SqliteStoreMode;
use escrow_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "escrow.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "ESCROW_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for the quorum threshold.
const MAX_QUORUM_THRESHOLD: usize = 64;
/// Upper bound for any configured timeout in milliseconds.
const MAX_TIMEOUT_MS: u64 = 300_000;
/// Upper bound for evidence items per submission.
const MAX_EVIDENCE_ITEMS_LIMIT: usize = 256;
/// Upper bound for total evidence bytes per submission.
const MAX_EVIDENCE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Upper bound for remote response bodies.
const MAX_RESPONSE_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Default busy timeout for the sqlite store.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root configuration for the escrow stack.
///
/// # Invariants
/// - A loaded config has passed [`EscrowConfig::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EscrowConfig {
    /// Engine thresholds, deadlines, and limits.
    #[serde(default)]
    pub engine: EngineSection,
    /// Attestation oracle endpoint.
    #[serde(default)]
    pub oracle: Option<HttpClientConfig>,
    /// Settlement ledger endpoint.
    #[serde(default)]
    pub ledger: Option<HttpClientConfig>,
    /// Vault persistence backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit sink selection.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl EscrowConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path, env::var(CONFIG_ENV_VAR).ok())?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parses and validates configuration from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bytes are oversize, not UTF-8, not
    /// valid TOML, or fail validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        if let Some(oracle) = &self.oracle {
            validate_endpoint("oracle", oracle)?;
        }
        if let Some(ledger) = &self.ledger {
            validate_endpoint("ledger", ledger)?;
        }
        self.store.validate()?;
        self.audit.validate()
    }

    /// Returns the engine configuration derived from the `[engine]` section.
    #[must_use]
    pub const fn to_engine_config(&self) -> EngineConfig {
        self.engine.to_engine_config()
    }
}

// ============================================================================
// SECTION: Engine Section
// ============================================================================

/// Engine thresholds, deadlines, and evidence limits.
///
/// # Invariants
/// - `quorum_threshold` is within `1..=64`.
/// - `min_confidence` is within `0..=100`.
/// - Timeouts are within `1..=300000` ms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    /// Distinct validator approvals required before release.
    pub quorum_threshold: usize,
    /// Minimum normalized oracle confidence accepted.
    pub min_confidence: u8,
    /// Oracle call deadline in milliseconds.
    pub oracle_timeout_ms: u64,
    /// Ledger call deadline in milliseconds.
    pub ledger_timeout_ms: u64,
    /// Maximum evidence items per submission.
    pub max_evidence_items: usize,
    /// Maximum total evidence bytes per submission.
    pub max_evidence_bytes: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            quorum_threshold: engine.quorum_threshold,
            min_confidence: engine.min_confidence,
            oracle_timeout_ms: duration_ms(engine.oracle_timeout),
            ledger_timeout_ms: duration_ms(engine.ledger_timeout),
            max_evidence_items: engine.max_evidence_items,
            max_evidence_bytes: engine.max_evidence_bytes,
        }
    }
}

impl EngineSection {
    /// Validates engine limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.quorum_threshold == 0 || self.quorum_threshold > MAX_QUORUM_THRESHOLD {
            return Err(ConfigError::Invalid(format!(
                "engine.quorum_threshold must be between 1 and {MAX_QUORUM_THRESHOLD}"
            )));
        }
        if self.min_confidence > 100 {
            return Err(ConfigError::Invalid(
                "engine.min_confidence must be between 0 and 100".to_string(),
            ));
        }
        validate_timeout("engine.oracle_timeout_ms", self.oracle_timeout_ms)?;
        validate_timeout("engine.ledger_timeout_ms", self.ledger_timeout_ms)?;
        if self.max_evidence_items == 0 || self.max_evidence_items > MAX_EVIDENCE_ITEMS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "engine.max_evidence_items must be between 1 and {MAX_EVIDENCE_ITEMS_LIMIT}"
            )));
        }
        if self.max_evidence_bytes == 0 || self.max_evidence_bytes > MAX_EVIDENCE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "engine.max_evidence_bytes must be between 1 and {MAX_EVIDENCE_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Converts the section into runtime engine configuration.
    #[must_use]
    pub const fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            quorum_threshold: self.quorum_threshold,
            oracle_timeout: Some(Duration::from_millis(self.oracle_timeout_ms)),
            ledger_timeout: Some(Duration::from_millis(self.ledger_timeout_ms)),
            min_confidence: self.min_confidence,
            max_evidence_items: self.max_evidence_items,
            max_evidence_bytes: self.max_evidence_bytes,
        }
    }
}

// ============================================================================
// SECTION: Store Section
// ============================================================================

/// Vault store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store (lost on exit).
    #[default]
    Memory,
    /// Durable `SQLite` store.
    Sqlite,
}

/// Vault store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Optional max snapshots retained per vault.
    #[serde(default)]
    pub max_versions: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_versions: None,
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())?;
                if self.max_versions == Some(0) {
                    return Err(ConfigError::Invalid(
                        "store max_versions must be greater than zero".to_string(),
                    ));
                }
                validate_timeout("store.busy_timeout_ms", self.busy_timeout_ms)
            }
        }
    }

    /// Returns the `SQLite` store configuration when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
                max_versions: self.max_versions,
            }),
            _ => None,
        }
    }
}

/// Returns the default busy timeout for the sqlite store.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Audit Section
// ============================================================================

/// Audit sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Audit disabled.
    None,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller, the environment, or the default.
fn resolve_path(path: Option<&Path>, env_path: Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Some(env_path) = env_path {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a timeout value in milliseconds.
fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between 1 and {MAX_TIMEOUT_MS}"
        )));
    }
    Ok(())
}

/// Validates an outbound endpoint section.
fn validate_endpoint(section: &str, config: &HttpClientConfig) -> Result<(), ConfigError> {
    let endpoint = config.endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::Invalid(format!("{section}.endpoint must be non-empty")));
    }
    let cleartext = endpoint.starts_with("http://");
    if !endpoint.starts_with("https://") && !cleartext {
        return Err(ConfigError::Invalid(format!("{section}.endpoint must be an http(s) url")));
    }
    if cleartext && !config.allow_http {
        return Err(ConfigError::Invalid(format!(
            "{section}.endpoint uses http but {section}.allow_http is false"
        )));
    }
    validate_timeout(&format!("{section}.timeout_ms"), config.timeout_ms)?;
    if config.max_response_bytes == 0 || config.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
        return Err(ConfigError::Invalid(format!(
            "{section}.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
        )));
    }
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{section}.user_agent must be non-empty")));
    }
    Ok(())
}

/// Converts an optional duration into whole milliseconds for display defaults.
fn duration_ms(duration: Option<Duration>) -> u64 {
    duration.map_or(MAX_TIMEOUT_MS, |value| u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
