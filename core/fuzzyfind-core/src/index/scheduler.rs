//! Debounced, serialized index updates.
//!
//! The scheduler never reads the clock or spawns anything. The owner (the
//! daemon event loop) passes `now` in, waits until `next_deadline()`, runs the
//! `UpdateJob`s it is handed one at a time, and reports each result back
//! through `job_finished`.
//!
//! ```text
//! Idle ──fire (dirt)──▶ Running(job, queue) ──job_finished──▶ Running(next) … ──▶ Idle
//!   ▲                       │ fire while running: park until the run ends,
//!   │                       │ then re-arm from job_finished
//!   └──fire (no dirt)───────┘
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::dirty::{DirtyTracker, FsChange};

/// One external indexer invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum UpdateJob {
    /// Build the index from scratch.
    Create,
    /// Update the whole tree in one call.
    Full,
    /// Update a single workspace-relative file.
    File(String),
}

impl fmt::Display for UpdateJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateJob::Create => f.write_str("create"),
            UpdateJob::Full => f.write_str("full"),
            UpdateJob::File(path) => write!(f, "file:{}", path),
        }
    }
}

/// Result of running one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job: UpdateJob,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl JobOutcome {
    pub fn succeeded(job: UpdateJob) -> Self {
        Self {
            job,
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn failed(job: UpdateJob, stderr: impl Into<String>) -> Self {
        Self {
            job,
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug)]
enum RunState {
    Idle,
    Running {
        current: UpdateJob,
        queue: VecDeque<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub job: UpdateJob,
    pub success: bool,
    pub finished_at: DateTime<Utc>,
}

/// Snapshot for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub updating: bool,
    pub current_job: Option<UpdateJob>,
    pub queued_files: usize,
    pub pending_paths: usize,
    pub all_dirty: bool,
    pub create_requested: bool,
    /// A fire arrived during the current run and will re-arm when it ends.
    pub rerun_pending: bool,
    /// Milliseconds until the debounce timer fires.
    pub fires_in_ms: Option<u64>,
    pub last_run: Option<LastRun>,
}

#[derive(Debug)]
pub struct UpdateScheduler {
    delay: Duration,
    deadline: Option<Instant>,
    tracker: DirtyTracker,
    run: RunState,
    create_requested: bool,
    rerun_pending: bool,
    last_run: Option<LastRun>,
}

impl UpdateScheduler {
    pub fn new(tracker: DirtyTracker, delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            tracker,
            run: RunState::Idle,
            create_requested: false,
            rerun_pending: false,
            last_run: None,
        }
    }

    pub fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Swaps in new classification settings. Dirt recorded under the old
    /// settings is kept as a full update.
    pub fn reconfigure(&mut self, tracker: DirtyTracker, delay: Duration, now: Instant) {
        let had_dirt = !self.tracker.state().is_empty();
        self.tracker = tracker;
        self.delay = delay;
        if had_dirt {
            self.tracker.mark_all_dirty();
            self.notify(now);
        }
    }

    /// (Re)arms the debounce timer, replacing any pending deadline.
    pub fn notify(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Feeds a watcher event through the tracker, arming the timer if it counted.
    pub fn record(&mut self, change: &FsChange, now: Instant) -> bool {
        let counted = self.tracker.record(change);
        if counted {
            self.notify(now);
        }
        counted
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_updating(&self) -> bool {
        matches!(self.run, RunState::Running { .. })
    }

    /// Fires the timer if its deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> Option<UpdateJob> {
        match self.deadline {
            Some(deadline) if deadline <= now => self.on_timer_fire(now),
            _ => None,
        }
    }

    /// Drains the tracker and returns the first job of the run, if any.
    ///
    /// A fire during a run leaves the timer disarmed; `job_finished` re-arms
    /// it once the run ends, so a zero delay cannot spin.
    pub fn on_timer_fire(&mut self, _now: Instant) -> Option<UpdateJob> {
        self.deadline = None;
        if self.is_updating() {
            tracing::debug!("Update already running; deferring until it ends");
            self.rerun_pending = true;
            return None;
        }

        let state = self.tracker.drain();
        if std::mem::take(&mut self.create_requested) {
            return Some(self.start(UpdateJob::Create, VecDeque::new()));
        }
        if state.all_dirty {
            return Some(self.start(UpdateJob::Full, VecDeque::new()));
        }

        let mut queue: VecDeque<String> = state.dirty_paths.into_iter().collect();
        match queue.pop_front() {
            Some(first) => Some(self.start(UpdateJob::File(first), queue)),
            None => None,
        }
    }

    fn start(&mut self, job: UpdateJob, queue: VecDeque<String>) -> UpdateJob {
        tracing::info!(job = %job, queued = queue.len(), "Starting index update");
        self.run = RunState::Running {
            current: job.clone(),
            queue,
        };
        job
    }

    /// Records a finished job and returns the next one in this run.
    pub fn job_finished(&mut self, outcome: JobOutcome, now: Instant) -> Option<UpdateJob> {
        if outcome.success {
            tracing::debug!(job = %outcome.job, "Index job finished");
        } else {
            tracing::warn!(
                job = %outcome.job,
                exit_code = ?outcome.exit_code,
                stdout = %outcome.stdout.trim(),
                stderr = %outcome.stderr.trim(),
                "Index job failed"
            );
        }
        self.last_run = Some(LastRun {
            job: outcome.job.clone(),
            success: outcome.success,
            finished_at: Utc::now(),
        });

        let next = match &mut self.run {
            RunState::Running { current, queue } => {
                if *current != outcome.job {
                    tracing::debug!(expected = %current, got = %outcome.job, "Unexpected job result");
                }
                queue.pop_front().map(UpdateJob::File)
            }
            RunState::Idle => None,
        };

        match next {
            Some(job) => {
                if let RunState::Running { current, .. } = &mut self.run {
                    *current = job.clone();
                }
                Some(job)
            }
            None => {
                self.run = RunState::Idle;
                tracing::info!("Index update idle");
                if std::mem::take(&mut self.rerun_pending) {
                    self.notify(now);
                }
                None
            }
        }
    }

    /// Marks everything dirty and fires immediately.
    pub fn force_full_update(&mut self, now: Instant) -> Option<UpdateJob> {
        self.tracker.mark_all_dirty();
        self.on_timer_fire(now)
    }

    /// Requests an index build from scratch. Supersedes any pending dirt.
    pub fn create_index(&mut self, now: Instant) -> Option<UpdateJob> {
        self.create_requested = true;
        self.on_timer_fire(now)
    }

    pub fn status(&self, now: Instant) -> SchedulerStatus {
        let (current_job, queued_files) = match &self.run {
            RunState::Idle => (None, 0),
            RunState::Running { current, queue } => (Some(current.clone()), queue.len()),
        };
        let state = self.tracker.state();
        SchedulerStatus {
            updating: self.is_updating(),
            current_job,
            queued_files,
            pending_paths: state.dirty_paths.len(),
            all_dirty: state.all_dirty,
            create_requested: self.create_requested,
            rerun_pending: self.rerun_pending,
            fires_in_ms: self
                .deadline
                .map(|d| d.saturating_duration_since(now).as_millis() as u64),
            last_run: self.last_run.clone(),
        }
    }
}
