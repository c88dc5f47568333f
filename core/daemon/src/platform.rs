//! The daemon's side effects, behind one trait so the service can be driven
//! in tests without tmux, editors, indexers or inotify.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use fuzzyfind_core::{
    Config, IndexCommands, JobOutcome, LocationSink, OpenCommandSink, TerminalHost, TmuxHost,
    UpdateJob,
};
use tracing::warn;

use crate::service::LoopEvent;
use crate::watcher::ChangeWatcher;

pub trait Platform {
    fn terminal_host(&self, config: &Config) -> Arc<dyn TerminalHost>;

    fn location_sink(&self, config: &Config) -> fuzzyfind_core::Result<Arc<dyn LocationSink>>;

    /// Starts `job` without blocking. Must eventually deliver `LoopEvent::JobDone`.
    fn run_job(&self, commands: &IndexCommands, workspace: &Path, job: UpdateJob);

    fn watch(&self, root: &Path) -> Option<ChangeWatcher>;
}

/// tmux, the configured open command, one indexer thread per job and notify.
pub struct SystemPlatform {
    events: Sender<LoopEvent>,
}

impl SystemPlatform {
    pub fn new(events: Sender<LoopEvent>) -> Self {
        Self { events }
    }
}

impl Platform for SystemPlatform {
    fn terminal_host(&self, config: &Config) -> Arc<dyn TerminalHost> {
        Arc::new(TmuxHost::new(config.session.tmux_program.clone()))
    }

    fn location_sink(&self, config: &Config) -> fuzzyfind_core::Result<Arc<dyn LocationSink>> {
        Ok(Arc::new(OpenCommandSink::new(config.open_command.clone())?))
    }

    fn run_job(&self, commands: &IndexCommands, workspace: &Path, job: UpdateJob) {
        let commands = commands.clone();
        let workspace: PathBuf = workspace.to_path_buf();
        let events = self.events.clone();
        let thread_job = job.clone();

        let spawned = thread::Builder::new()
            .name("fuzzyfind-indexer".to_string())
            .spawn(move || {
                let outcome = commands.run(thread_job, &workspace);
                let _ = events.send(LoopEvent::JobDone(outcome));
            });

        // Without a completion event the scheduler would stay "running" forever.
        if let Err(err) = spawned {
            warn!(error = %err, "Failed to spawn indexer thread");
            let _ = self
                .events
                .send(LoopEvent::JobDone(JobOutcome::failed(job, err.to_string())));
        }
    }

    fn watch(&self, root: &Path) -> Option<ChangeWatcher> {
        match ChangeWatcher::start(root, self.events.clone()) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(error = %err, "File watching disabled");
                None
            }
        }
    }
}
