//! # fuzzyfind-core
//!
//! Core library for fuzzyfind: drives interactive fuzzy-search sessions in a
//! reusable terminal and keeps a symbol index current as files change.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The daemon owns a single
//!   event-loop thread and feeds every type here from it.
//! - **Not thread-safe**: Sessions and the scheduler are plain `&mut self`
//!   state machines. Callers serialize access.
//! - **Time is an argument**: Debounce logic takes `Instant`s instead of
//!   reading the clock, so scheduling is deterministic under test.
//! - **Collaborators behind traits**: The terminal host (`TerminalHost`), the
//!   search command generators (`CommandSource`) and the jump-to-location UI
//!   (`LocationSink`) are all injected.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fuzzyfind_core::{Config, EditorState, MultiModeSession};
//!
//! let config = Config::load(&storage)?;
//! let mut session = MultiModeSession::from_config(&config, &storage, host, &workspace)?;
//! session.select_mode("find-symbol")?;
//! session.present(&EditorState::new(workspace, Some("src/main.c".into())))?;
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod index;
pub mod lock;
pub mod patterns;
pub mod selection;
pub mod session;
pub mod storage;

pub use config::*;
pub use env::EnvironmentSnapshot;
pub use error::{FuzzyError, Result};
pub use index::{
    ChangeClassifier, DirtyState, DirtyTracker, FsChange, FsChangeKind, IndexCommands,
    JobOutcome, PathClass, SchedulerStatus, UpdateJob, UpdateScheduler,
};
pub use lock::MarkerDir;
pub use selection::{parse_selection, Location, LocationSink, OpenCommandSink};
pub use session::{
    CommandSource, EditorState, MultiModeSession, PresentOutcome, SearchTemplate, SessionHandle,
    SessionState, TerminalHost, TerminalId, TmuxHost,
};
pub use storage::StorageConfig;
