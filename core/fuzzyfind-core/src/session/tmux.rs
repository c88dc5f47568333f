//! tmux-backed terminal host.
//!
//! Each fuzzyfind session is one detached tmux session. The editor attaches
//! to it (or is already inside tmux, in which case `focus` switches the
//! client to it).

use std::path::Path;
use std::process::{Command, Output};

use super::host::{TerminalHost, TerminalId};
use crate::env::EnvironmentSnapshot;
use crate::error::{FuzzyError, Result};

#[derive(Debug, Clone)]
pub struct TmuxHost {
    program: String,
}

impl Default for TmuxHost {
    fn default() -> Self {
        Self::new("tmux")
    }
}

impl TmuxHost {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run<I, S>(&self, args: I) -> std::io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        Command::new(&self.program).args(args).output()
    }

    fn run_checked(&self, operation: &str, args: &[String]) -> Result<()> {
        match self.run(args) {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(FuzzyError::Terminal {
                operation: operation.to_string(),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Err(err) => Err(FuzzyError::Terminal {
                operation: operation.to_string(),
                details: err.to_string(),
            }),
        }
    }
}

/// tmux rejects `.` and `:` in session names.
pub fn sanitize_session_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '.' || c == ':' { '_' } else { c })
        .collect()
}

fn session_target(id: &TerminalId) -> String {
    format!("={}", id.0)
}

fn pane_target(id: &TerminalId) -> String {
    format!("={}:", id.0)
}

/// Arguments for `tmux new-session`, split out for testing.
pub fn new_session_args(session: &str, env: &EnvironmentSnapshot, cwd: &Path) -> Vec<String> {
    let mut args = vec![
        "new-session".to_string(),
        "-d".to_string(),
        "-s".to_string(),
        session.to_string(),
        "-c".to_string(),
        cwd.to_string_lossy().to_string(),
    ];
    for (key, value) in env.set_overrides() {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    let removed: Vec<&str> = env.removed().collect();
    if !removed.is_empty() {
        args.push("env".to_string());
        for key in removed {
            args.push("-u".to_string());
            args.push(key.to_string());
        }
        args.push(env.get("SHELL").unwrap_or("sh").to_string());
    }
    args
}

impl TerminalHost for TmuxHost {
    fn create(&self, name: &str, env: &EnvironmentSnapshot, cwd: &Path) -> Result<TerminalId> {
        let session = sanitize_session_name(name);
        // A session left over from a previous daemon would shadow ours.
        let _ = self.run(["kill-session", "-t", &format!("={}", session)]);

        self.run_checked("new-session", &new_session_args(&session, env, cwd))?;
        tracing::debug!(session = %session, "Created tmux session");
        Ok(TerminalId(session))
    }

    fn has_exited(&self, id: &TerminalId) -> bool {
        match self.run(["has-session", "-t", &session_target(id)]) {
            Ok(output) => !output.status.success(),
            Err(_) => true,
        }
    }

    fn send_text(&self, id: &TerminalId, text: &str) -> Result<()> {
        let target = pane_target(id);
        self.run_checked(
            "send-keys",
            &[
                "send-keys".to_string(),
                "-t".to_string(),
                target.clone(),
                "-l".to_string(),
                text.to_string(),
            ],
        )?;
        self.run_checked(
            "send-keys",
            &[
                "send-keys".to_string(),
                "-t".to_string(),
                target,
                "Enter".to_string(),
            ],
        )
    }

    fn interrupt(&self, id: &TerminalId) -> Result<()> {
        self.run_checked(
            "send-keys",
            &[
                "send-keys".to_string(),
                "-t".to_string(),
                pane_target(id),
                "C-c".to_string(),
            ],
        )
    }

    fn focus(&self, id: &TerminalId) -> Result<()> {
        self.run_checked(
            "switch-client",
            &[
                "switch-client".to_string(),
                "-t".to_string(),
                session_target(id),
            ],
        )
    }

    fn dispose(&self, id: &TerminalId) {
        if let Err(err) = self.run(["kill-session", "-t", &session_target(id)]) {
            tracing::debug!(error = %err, session = %id, "Failed to kill tmux session");
        }
    }
}
