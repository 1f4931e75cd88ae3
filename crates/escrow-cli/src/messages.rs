// crates/escrow-cli/src/messages.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Provides the message catalog and formatting for CLI output.
// Purpose: Centralize user-facing strings of the `escrow` binary.
// Dependencies: Standard library collections.
// ============================================================================

//! ## Overview
//! Every user-facing string of the `escrow` binary is a catalog entry with
//! `{placeholder}` slots. Runtime output is routed through the
//! [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to the key itself.
//! - Placeholder substitutions preserve deterministic order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
///
/// # Invariants
/// - `key` matches a placeholder name without braces (for example, `path`).
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static catalog entries.
const CATALOG: &[(&str, &str)] = &[
    ("main.version", "escrow {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("output.json_failed", "Failed to serialize output: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("config.validate.ok", "Config validated successfully."),
    ("engine.init_failed", "Failed to initialize escrow engine: {error}"),
    ("escrow.failed", "{kind}: {error}"),
    ("clock.unavailable", "System clock is before the unix epoch: {error}"),
    (
        "proof.evidence.invalid_spec",
        "Invalid evidence '{value}': expected MIME=PATH with a non-empty mime type and path.",
    ),
    ("input.read_failed", "Failed to read {kind} at {path}: {error}"),
    (
        "input.read_too_large",
        "Refusing to read {kind} at {path} because it is {size} bytes (limit {limit}).",
    ),
    ("input.kind.evidence", "evidence file"),
    ("store.open_failed", "Failed to open vault store: {error}"),
    ("store.history.requires_sqlite", "Vault history requires the sqlite store backend."),
    ("store.history.failed", "Failed to list vault versions: {error}"),
];

/// Returns the message catalog.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    CATALOG_MAP.get_or_init(|| CATALOG.iter().copied().collect())
}

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Formats the message for `key` while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a catalog message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::messages::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::messages::translate($key, args)
    }};
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::CATALOG;
    use super::MessageArg;
    use super::translate;

    #[test]
    fn substitutes_placeholders() {
        let message = translate(
            "escrow.failed",
            vec![MessageArg::new("kind", "not_found"), MessageArg::new("error", "vault-9")],
        );
        assert_eq!(message, "not_found: vault-9");
    }

    #[test]
    fn missing_key_falls_back_to_key() {
        assert_eq!(translate("no.such.key", Vec::new()), "no.such.key");
    }

    #[test]
    fn catalog_keys_are_unique() {
        let mut keys: Vec<&str> = CATALOG.iter().map(|(key, _)| *key).collect();
        let total = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn macro_formats_named_arguments() {
        let message = crate::t!("main.version", version = "0.1.0");
        assert_eq!(message, "escrow 0.1.0");
    }
}
