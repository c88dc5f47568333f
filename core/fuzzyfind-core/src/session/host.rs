//! Terminal host abstraction.
//!
//! The process that actually owns the interactive terminal (an editor's
//! integrated terminal, tmux, a test double) sits behind this trait. The
//! session lifecycle only needs these six operations.

use std::fmt;
use std::path::Path;

use crate::env::EnvironmentSnapshot;
use crate::error::Result;

/// Opaque identifier of a live terminal created by a `TerminalHost`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TerminalId(pub String);

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for terminal host integrations.
///
/// Implementors should:
/// - Treat any failure to query a terminal as "exited"
/// - Never block on the command running inside the terminal
pub trait TerminalHost: Send + Sync {
    /// Creates a fresh terminal named `name`, starting a shell in `cwd` with `env` applied.
    fn create(&self, name: &str, env: &EnvironmentSnapshot, cwd: &Path) -> Result<TerminalId>;

    /// True once the terminal's process has ended (or can no longer be found).
    fn has_exited(&self, id: &TerminalId) -> bool;

    /// Types `text` followed by Enter.
    fn send_text(&self, id: &TerminalId, text: &str) -> Result<()>;

    /// Sends an interrupt (Ctrl-C) to abort whatever is running.
    fn interrupt(&self, id: &TerminalId) -> Result<()>;

    /// Brings the terminal to the foreground.
    fn focus(&self, id: &TerminalId) -> Result<()>;

    /// Releases the terminal. Must tolerate already-exited terminals.
    fn dispose(&self, id: &TerminalId);
}
