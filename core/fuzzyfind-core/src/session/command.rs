//! Command line injected into the session terminal.
//!
//! In order, the line:
//! 1. creates the marker,
//! 2. exports the search command as `FUZZYFIND_SEARCH`,
//! 3. runs the filter with reload bindings that re-read that variable and a
//!    selection binding that hands the chosen record and the session's
//!    workspace to `select_command`,
//! 4. removes the marker once the filter exits, whatever its exit status.
//!
//! The search command is re-run by the filter on every query change with the
//! query as its first positional argument, so templates reference the query as
//! `{query}` and never see fzf's own placeholder syntax.

use std::path::Path;

use crate::config::{FilterConfig, ShellDialect};

pub const SEARCH_ENV_VAR: &str = "FUZZYFIND_SEARCH";

/// Doubles single quotes for embedding in a single-quoted PowerShell string.
pub fn double_single_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

/// Single-quotes `value` for a POSIX shell, where `''` inside quotes is an
/// empty concatenation rather than an escape, so `'` becomes `'\''`.
pub fn posix_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Single-quotes `value` for PowerShell.
pub fn powershell_quote(value: &str) -> String {
    format!("'{}'", double_single_quotes(value))
}

pub fn quote(dialect: ShellDialect, value: &str) -> String {
    match dialect {
        ShellDialect::Posix => posix_quote(value),
        ShellDialect::Powershell => powershell_quote(value),
    }
}

/// Leaves plain words unquoted to keep the typed line readable.
fn quote_word(dialect: ShellDialect, value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./,%+@".contains(c));
    if plain {
        value.to_string()
    } else {
        quote(dialect, value)
    }
}

/// How a search command refers to the live query in each dialect.
pub fn query_reference(dialect: ShellDialect) -> &'static str {
    match dialect {
        ShellDialect::Posix => "\"$1\"",
        ShellDialect::Powershell => "$args[0]",
    }
}

fn reload_action(dialect: ShellDialect) -> String {
    match dialect {
        ShellDialect::Posix => format!("reload:sh -c \"${}\" fuzzyfind {{q}}", SEARCH_ENV_VAR),
        ShellDialect::Powershell => format!(
            "reload:pwsh -NoProfile -Command \"& ([scriptblock]::Create($env:{})) {{q}}\"",
            SEARCH_ENV_VAR
        ),
    }
}

/// Builds the full line for one present.
pub fn build_command_line(
    dialect: ShellDialect,
    marker: &Path,
    search_command: &str,
    filter: &FilterConfig,
    workspace: &Path,
) -> String {
    let marker = marker.to_string_lossy();
    let reload = reload_action(dialect);

    let mut filter_words = vec![quote_word(dialect, &filter.program)];
    filter_words.extend(filter.args.iter().map(|arg| quote_word(dialect, arg)));
    for event in ["start", "change"] {
        filter_words.push("--bind".to_string());
        filter_words.push(quote(dialect, &format!("{}:{}", event, reload)));
    }
    filter_words.push("--bind".to_string());
    filter_words.push(quote(
        dialect,
        &format!(
            "enter:execute-silent({} --workspace {} {{}})+abort",
            filter.select_command,
            quote(dialect, &workspace.to_string_lossy())
        ),
    ));
    let filter_invocation = filter_words.join(" ");

    match dialect {
        ShellDialect::Posix => format!(
            "touch {marker}; export {var}={value}; {filter}; rm -f {marker}",
            marker = posix_quote(&marker),
            var = SEARCH_ENV_VAR,
            value = posix_quote(search_command),
            filter = filter_invocation,
        ),
        ShellDialect::Powershell => format!(
            "New-Item -ItemType File -Force -Path {marker} | Out-Null; $env:{var} = {value}; {filter}; Remove-Item -Force -ErrorAction SilentlyContinue {marker}",
            marker = powershell_quote(&marker),
            var = SEARCH_ENV_VAR,
            value = powershell_quote(search_command),
            filter = filter_invocation,
        ),
    }
}
