//! Marker files signalling that an interactive query is in progress.
//!
//! There is no process handle for the filter tool running inside the terminal,
//! so the command line injected into the session creates a marker before the
//! filter starts and removes it when the filter exits. The daemon only ever
//! reads markers (and removes them on disposal).
//!
//! # Marker Structure
//!
//! Location: `{markers_dir}/{lockfile_id}.lock` where `{lockfile_id}` is
//! `{session name}-{md5 of workspace root}`. The file is zero bytes.
//!
//! # Semantics
//!
//! - Absent: the filter finished (selection made, aborted, or never started).
//! - Present: the filter is waiting on a query. Whether that query is still
//!   the right one is decided by the session's status comparison.
//!
//! Any I/O failure is treated as "absent", which makes the caller re-inject.

use fs_err as fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const MARKER_EXTENSION: &str = "lock";

/// Normalize a path for consistent hashing.
/// Strips trailing slashes except for root "/".
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Computes the stable lockfile token for a session in a workspace.
pub fn compute_lockfile_id(session_name: &str, workspace: &Path) -> String {
    let normalized = normalize_path(&workspace.to_string_lossy());
    format!("{}-{:x}", session_name, md5::compute(normalized))
}

/// Directory holding one marker file per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerDir {
    dir: PathBuf,
}

impl MarkerDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the marker for `lockfile_id` (without checking if it exists).
    pub fn marker_path(&self, lockfile_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", lockfile_id, MARKER_EXTENSION))
    }

    pub fn exists(&self, lockfile_id: &str) -> bool {
        self.marker_path(lockfile_id).is_file()
    }

    /// Creates the directory if needed. Failures are logged and ignored; the
    /// shell `touch` will fail too and the session degrades to "always re-inject".
    pub fn ensure_dir(&self) {
        if let Err(err) = fs::create_dir_all(&self.dir) {
            tracing::debug!(error = %err, dir = %self.dir.display(), "Failed to create marker dir");
        }
    }

    /// Creates the marker. Returns false on failure.
    pub fn create(&self, lockfile_id: &str) -> bool {
        self.ensure_dir();
        match fs::write(self.marker_path(lockfile_id), b"") {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %err, lockfile_id, "Failed to create marker");
                false
            }
        }
    }

    /// Best-effort removal. Not-found is success; other errors are logged.
    pub fn remove(&self, lockfile_id: &str) {
        match fs::remove_file(self.marker_path(lockfile_id)) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                tracing::debug!(error = %err, lockfile_id, "Failed to remove marker");
            }
        }
    }

    /// Removes every marker in the directory. Run at daemon startup, when no
    /// session from a previous daemon can still be trusted.
    pub fn sweep(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == MARKER_EXTENSION) {
                if fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
        }
        removed
    }
}
