//! Interactive filter sessions.
//! Add new terminal hosts next to `tmux.rs` and implement `TerminalHost`.

pub mod command;
mod handle;
mod host;
mod modes;
mod tmux;

pub use handle::{LaunchOptions, PresentOutcome, SessionHandle, SessionState};
pub use host::{TerminalHost, TerminalId};
pub use modes::{CommandSource, EditorState, MultiModeSession, SearchTemplate};
pub use tmux::{sanitize_session_name, TmuxHost};
