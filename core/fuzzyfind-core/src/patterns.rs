//! Compiled regex patterns shared across the crate.
//!
//! Compiled once on first use. Update these when the filter tool's record
//! format or the configuration placeholder syntax changes.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration Regexes
// ═══════════════════════════════════════════════════════════════════════════════

/// `${env:NAME}` references inside environment override values.
pub static RE_ENV_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{env:([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// `{name}` placeholders inside command templates.
pub static RE_TEMPLATE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// Selection Regexes
// ═══════════════════════════════════════════════════════════════════════════════

/// A filter record: optional quote, path, `:line`, optional `:column`.
pub static RE_SELECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^["']?(?P<path>[^:"'\r\n]+):(?P<line>\d+)(?::(?P<column>\d+))?"#).unwrap()
});

/// ANSI SGR escapes left in records by `--color=always` searchers.
pub static RE_ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());
