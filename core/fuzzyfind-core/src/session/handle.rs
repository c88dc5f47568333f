//! One reusable interactive session.
//!
//! ## State Machine
//!
//! ```text
//! Absent ──present──▶ Live(typing) ──filter waits──▶ Live(idle, marker present)
//!                        ▲                               │ status changed / marker gone
//!                        └──────────present──────────────┘
//! Live ──terminal exits──▶ Stale ──present──▶ Live(typing)
//! any ──dispose──▶ Disposed (terminal)
//! ```
//!
//! `present` decides between three outcomes:
//!
//! | terminal | marker  | status    | action                       |
//! |----------|---------|-----------|------------------------------|
//! | absent/stale | -   | -         | create terminal, inject      |
//! | live     | absent  | -         | interrupt, inject            |
//! | live     | present | changed   | interrupt, inject            |
//! | live     | present | unchanged | reuse (focus only)           |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::command::build_command_line;
use super::host::{TerminalHost, TerminalId};
use super::modes::{CommandSource, EditorState};
use crate::config::{FilterConfig, ShellDialect};
use crate::env::EnvironmentSnapshot;
use crate::error::{FuzzyError, Result};
use crate::lock::MarkerDir;

/// Everything needed to start and feed a terminal. Fixed for the session's lifetime.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub env: EnvironmentSnapshot,
    pub cwd: PathBuf,
    pub dialect: ShellDialect,
    pub filter: FilterConfig,
    pub interrupt_grace: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentOutcome {
    /// A new terminal was created and the command injected.
    Spawned,
    /// The live terminal was interrupted and the command re-injected.
    Restarted,
    /// The live terminal's filter was still on the right query.
    Reused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Absent,
    Stale,
    Live,
    Disposed,
}

pub struct SessionHandle {
    name: String,
    lockfile_id: String,
    host: Arc<dyn TerminalHost>,
    markers: MarkerDir,
    launch: LaunchOptions,
    handle: Option<TerminalId>,
    last_observed_status: Option<String>,
    source: Option<Arc<dyn CommandSource>>,
    disposed: bool,
}

impl SessionHandle {
    pub fn new(
        name: impl Into<String>,
        lockfile_id: impl Into<String>,
        host: Arc<dyn TerminalHost>,
        markers: MarkerDir,
        launch: LaunchOptions,
    ) -> Self {
        Self {
            name: name.into(),
            lockfile_id: lockfile_id.into(),
            host,
            markers,
            launch,
            handle: None,
            last_observed_status: None,
            source: None,
            disposed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lockfile_id(&self) -> &str {
        &self.lockfile_id
    }

    pub fn last_observed_status(&self) -> Option<&str> {
        self.last_observed_status.as_deref()
    }

    pub fn terminal(&self) -> Option<&TerminalId> {
        self.handle.as_ref()
    }

    pub fn set_source(&mut self, source: Arc<dyn CommandSource>) {
        self.source = Some(source);
    }

    pub fn state(&self) -> SessionState {
        if self.disposed {
            SessionState::Disposed
        } else if self.handle.is_none() {
            SessionState::Absent
        } else if self.is_invalid() {
            SessionState::Stale
        } else {
            SessionState::Live
        }
    }

    /// True if there is no terminal or the terminal has exited.
    pub fn is_invalid(&self) -> bool {
        match &self.handle {
            None => true,
            Some(id) => self.host.has_exited(id),
        }
    }

    /// Removes the marker and releases the terminal. Idempotent.
    pub fn dispose_lock_and_handle(&mut self) {
        self.markers.remove(&self.lockfile_id);
        if let Some(id) = self.handle.take() {
            self.host.dispose(&id);
        }
        self.last_observed_status = None;
    }

    /// Tears the session down for good.
    pub fn dispose(&mut self) {
        self.dispose_lock_and_handle();
        self.disposed = true;
    }

    pub fn present(&mut self, editor: &EditorState) -> Result<PresentOutcome> {
        if self.disposed {
            return Err(FuzzyError::SessionDisposed(self.name.clone()));
        }
        let source = self
            .source
            .clone()
            .ok_or_else(|| FuzzyError::NoModeSelected(self.name.clone()))?;
        let status = source.status(editor);

        let (id, outcome) = match self.handle.clone() {
            Some(id) if !self.host.has_exited(&id) => {
                let marker_present = self.markers.exists(&self.lockfile_id);
                let status_changed =
                    self.last_observed_status.as_deref() != Some(status.as_str());
                if !marker_present || status_changed {
                    tracing::debug!(
                        session = %self.name,
                        marker_present,
                        status_changed,
                        "Interrupting live session"
                    );
                    if let Err(err) = self.host.interrupt(&id) {
                        tracing::debug!(error = %err, session = %self.name, "Interrupt failed");
                    }
                    if !self.launch.interrupt_grace.is_zero() {
                        std::thread::sleep(self.launch.interrupt_grace);
                    }
                    (id, PresentOutcome::Restarted)
                } else {
                    (id, PresentOutcome::Reused)
                }
            }
            _ => {
                self.dispose_lock_and_handle();
                self.markers.ensure_dir();
                let id = self
                    .host
                    .create(&self.lockfile_id, &self.launch.env, &self.launch.cwd)?;
                self.handle = Some(id.clone());
                (id, PresentOutcome::Spawned)
            }
        };

        if outcome != PresentOutcome::Reused {
            let line = build_command_line(
                self.launch.dialect,
                &self.markers.marker_path(&self.lockfile_id),
                &source.command(editor),
                &self.launch.filter,
                &self.launch.cwd,
            );
            self.host.send_text(&id, &line)?;
        }

        self.last_observed_status = Some(status);

        if let Err(err) = self.host.focus(&id) {
            tracing::debug!(error = %err, session = %self.name, "Focus failed");
        }

        tracing::info!(session = %self.name, outcome = ?outcome, "Session presented");
        Ok(outcome)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if !self.disposed {
            self.dispose();
        }
    }
}
