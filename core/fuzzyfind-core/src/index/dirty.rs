//! Accumulated dirty state between index update runs.

use indexmap::IndexSet;
use serde::Serialize;

use super::classify::{ChangeClassifier, PathClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsChangeKind {
    Change,
    Create,
    Delete,
}

/// One filesystem event, with the path relative to the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsChange {
    pub kind: FsChangeKind,
    pub path: String,
}

impl FsChange {
    pub fn new(kind: FsChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Paths awaiting reindex. Once `all_dirty` is set the paths are superseded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyState {
    /// Insertion-ordered; per-file updates run in this order.
    pub dirty_paths: IndexSet<String>,
    pub all_dirty: bool,
}

impl DirtyState {
    pub fn is_empty(&self) -> bool {
        !self.all_dirty && self.dirty_paths.is_empty()
    }
}

#[derive(Debug)]
pub struct DirtyTracker {
    classifier: ChangeClassifier,
    threshold: usize,
    state: DirtyState,
}

impl DirtyTracker {
    pub fn new(classifier: ChangeClassifier, threshold: usize) -> Self {
        Self {
            classifier,
            threshold: threshold.max(1),
            state: DirtyState::default(),
        }
    }

    pub fn classify(&self, path: &str) -> PathClass {
        self.classifier.classify(path)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    fn qualifies(&self, path: &str) -> bool {
        match self.classify(path) {
            PathClass::Watched => true,
            PathClass::Ignored => {
                tracing::trace!(path, "Ignored change");
                false
            }
            PathClass::Unwatched => false,
        }
    }

    /// Returns true if the path was watched and the state was updated.
    pub fn record_change(&mut self, path: &str) -> bool {
        if !self.qualifies(path) {
            return false;
        }
        if !self.state.all_dirty {
            self.state.dirty_paths.insert(path.to_string());
            if self.state.dirty_paths.len() >= self.threshold {
                tracing::debug!(
                    threshold = self.threshold,
                    "Dirty set reached threshold; switching to full update"
                );
                self.state.all_dirty = true;
            }
        }
        true
    }

    /// Structural changes can shift more than the file's own symbols.
    pub fn record_create(&mut self, path: &str) -> bool {
        if !self.qualifies(path) {
            return false;
        }
        self.state.all_dirty = true;
        true
    }

    pub fn record_delete(&mut self, path: &str) -> bool {
        if !self.qualifies(path) {
            return false;
        }
        self.state.all_dirty = true;
        true
    }

    pub fn record(&mut self, change: &FsChange) -> bool {
        match change.kind {
            FsChangeKind::Change => self.record_change(&change.path),
            FsChangeKind::Create => self.record_create(&change.path),
            FsChangeKind::Delete => self.record_delete(&change.path),
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.state.all_dirty = true;
    }

    /// Returns the accumulated state and starts a fresh one. Events recorded
    /// after this call belong to the next run.
    pub fn drain(&mut self) -> DirtyState {
        std::mem::take(&mut self.state)
    }

    pub fn state(&self) -> &DirtyState {
        &self.state
    }
}
