//! Incremental index maintenance.
//!
//! watcher events → `ChangeClassifier` → `DirtyTracker` → `UpdateScheduler`
//! → `IndexCommands`. Everything here is synchronous; the daemon owns the
//! watcher thread, the timer and the job thread.

mod classify;
mod dirty;
mod indexer;
mod scheduler;

pub use classify::{ChangeClassifier, PathClass};
pub use dirty::{DirtyState, DirtyTracker, FsChange, FsChangeKind};
pub use indexer::IndexCommands;
pub use scheduler::{JobOutcome, LastRun, SchedulerStatus, UpdateJob, UpdateScheduler};

use crate::config::IndexConfig;
use crate::error::Result;

/// Builds a scheduler from the `index` config section.
pub fn scheduler_from_config(config: &IndexConfig) -> Result<UpdateScheduler> {
    Ok(UpdateScheduler::new(
        tracker_from_config(config)?,
        config.debounce(),
    ))
}

pub fn tracker_from_config(config: &IndexConfig) -> Result<DirtyTracker> {
    Ok(DirtyTracker::new(
        ChangeClassifier::from_config(config)?,
        config.dirty_threshold,
    ))
}
