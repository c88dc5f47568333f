//! Daemon state and the single-threaded event loop.
//!
//! Every mutation of sessions and the scheduler happens on the loop thread.
//! Connection threads, the watcher and indexer jobs only send `LoopEvent`s.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fuzzyfind_core::index::{scheduler_from_config, tracker_from_config};
use fuzzyfind_core::{
    parse_selection, Config, EditorState, FsChange, FuzzyError, IndexCommands, JobOutcome,
    LocationSink, MarkerDir, MultiModeSession, StorageConfig, TerminalHost, UpdateJob,
    UpdateScheduler,
};
use fuzzyfind_daemon_protocol::{
    parse_present, parse_select, Method, Request, Response, PROTOCOL_VERSION,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::platform::Platform;
use crate::watcher::ChangeWatcher;

/// Upper bound on a loop wait when no debounce deadline is armed.
const IDLE_WAIT: Duration = Duration::from_secs(60);

pub enum LoopEvent {
    Request {
        request: Request,
        reply: Sender<Response>,
    },
    Fs(FsChange),
    JobDone(JobOutcome),
    /// Sent once the shutdown reply has been written.
    Stop,
}

struct IndexState {
    scheduler: UpdateScheduler,
    commands: IndexCommands,
    watcher: Option<ChangeWatcher>,
}

pub struct Service<P: Platform> {
    platform: P,
    storage: StorageConfig,
    config: Config,
    workspace: PathBuf,
    host: Arc<dyn TerminalHost>,
    sink: Option<Arc<dyn LocationSink>>,
    sessions: HashMap<PathBuf, MultiModeSession>,
    index: Option<IndexState>,
    started_at: DateTime<Utc>,
    shutdown_requested: bool,
}

impl<P: Platform> Service<P> {
    pub fn new(platform: P, storage: StorageConfig, config: Config, workspace: PathBuf) -> Self {
        let host = platform.terminal_host(&config);
        let mut service = Self {
            platform,
            storage,
            config: Config::default(),
            workspace,
            host,
            sink: None,
            sessions: HashMap::new(),
            index: None,
            started_at: Utc::now(),
            shutdown_requested: false,
        };
        service.apply_config(config, Instant::now());
        service
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn markers(&self) -> MarkerDir {
        match &self.config.session.markers_dir {
            Some(dir) => MarkerDir::new(PathBuf::from(dir)),
            None => MarkerDir::new(self.storage.markers_dir()),
        }
    }

    /// Clears markers a previous daemon left behind and runs the configured
    /// initial index build.
    pub fn startup(&mut self, now: Instant) {
        let removed = self.markers().sweep();
        if removed > 0 {
            info!(removed, "Removed stale session markers");
        }
        if self.config.index.build_on_start {
            if let Some(index) = &mut self.index {
                let job = index.scheduler.create_index(now);
                self.dispatch(job);
            }
        }
    }

    /// Installs a config snapshot. Existing sessions are torn down; the next
    /// present rebuilds them from the new snapshot.
    fn apply_config(&mut self, config: Config, now: Instant) {
        self.dispose_sessions();
        self.host = self.platform.terminal_host(&config);
        self.sink = match self.platform.location_sink(&config) {
            Ok(sink) => Some(sink),
            Err(err) => {
                warn!(error = %err, "Selection sink disabled");
                None
            }
        };

        if config.index.enabled {
            match self.rebuild_index(&config, now) {
                Ok(()) => {}
                Err(err) => {
                    warn!(error = %err, "Index maintenance disabled");
                    self.index = None;
                }
            }
        } else {
            self.index = None;
        }
        self.config = config;
    }

    fn rebuild_index(&mut self, config: &Config, now: Instant) -> fuzzyfind_core::Result<()> {
        let commands = IndexCommands::from_config(&config.index)?;
        match &mut self.index {
            Some(index) => {
                let tracker = tracker_from_config(&config.index)?;
                index
                    .scheduler
                    .reconfigure(tracker, config.index.debounce(), now);
                index.commands = commands;
            }
            None => {
                let scheduler = scheduler_from_config(&config.index)?;
                let watcher = self.platform.watch(&self.workspace);
                self.index = Some(IndexState {
                    scheduler,
                    commands,
                    watcher,
                });
            }
        }
        Ok(())
    }

    fn dispose_sessions(&mut self) {
        for (_, mut session) in self.sessions.drain() {
            session.dispose();
        }
    }

    pub fn teardown(&mut self) {
        info!(sessions = self.sessions.len(), "Tearing down sessions");
        self.dispose_sessions();
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.index.as_ref().and_then(|i| i.scheduler.next_deadline())
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(index) = &mut self.index {
            let job = index.scheduler.fire_if_due(now);
            self.dispatch(job);
        }
    }

    pub fn on_fs_change(&mut self, change: FsChange, now: Instant) {
        if let Some(index) = &mut self.index {
            if index.scheduler.record(&change, now) {
                debug!(path = %change.path, kind = ?change.kind, "Recorded change");
            }
        }
    }

    pub fn on_job_done(&mut self, outcome: JobOutcome, now: Instant) {
        match &mut self.index {
            Some(index) => {
                let next = index.scheduler.job_finished(outcome, now);
                self.dispatch(next);
            }
            None => debug!(job = %outcome.job, "Job finished after index was disabled"),
        }
    }

    fn dispatch(&mut self, job: Option<UpdateJob>) {
        if let (Some(job), Some(index)) = (job, &self.index) {
            self.platform
                .run_job(&index.commands, &self.workspace, job);
        }
    }

    pub fn handle_request(&mut self, request: Request, now: Instant) -> Response {
        if request.protocol_version != PROTOCOL_VERSION {
            return Response::error(
                request.id,
                "protocol_mismatch",
                "unsupported protocol version",
            );
        }

        let id = request.id;
        if self.shutdown_requested {
            return Response::error(id, "shutting_down", "daemon is shutting down");
        }
        match request.method {
            Method::GetHealth => Response::ok(
                id,
                json!({
                    "status": "ok",
                    "pid": std::process::id(),
                    "version": env!("CARGO_PKG_VERSION"),
                    "protocol_version": PROTOCOL_VERSION,
                    "started_at": self.started_at.to_rfc3339(),
                    "workspace": self.workspace.to_string_lossy(),
                }),
            ),
            Method::GetStatus => Response::ok(id, self.status(now)),
            Method::Present => match parse_present(request.params) {
                Ok(params) => {
                    let workspace = params
                        .workspace
                        .map(PathBuf::from)
                        .unwrap_or_else(|| self.workspace.clone());
                    let editor = EditorState::new(workspace, params.active_file);
                    match self.present(&params.mode, &editor) {
                        Ok(data) => Response::ok(id, data),
                        Err(err) => error_response(id, err),
                    }
                }
                Err(err) => Response::error_with_info(id, err),
            },
            Method::Select => match parse_select(request.params) {
                Ok(params) => {
                    let workspace = params
                        .workspace
                        .map(PathBuf::from)
                        .unwrap_or_else(|| self.workspace.clone());
                    self.select(id, &params.record, &workspace)
                }
                Err(err) => Response::error_with_info(id, err),
            },
            Method::ForceFullIndex => self.index_request(id, now, UpdateScheduler::force_full_update),
            Method::CreateIndex => self.index_request(id, now, UpdateScheduler::create_index),
            Method::ReloadConfig => match Config::load(&self.storage) {
                Ok(config) => {
                    info!("Reloading configuration");
                    self.apply_config(config, now);
                    Response::ok(
                        id,
                        json!({
                            "reloaded": true,
                            "modes": self.config.modes.keys().collect::<Vec<_>>(),
                            "index_enabled": self.index.is_some(),
                        }),
                    )
                }
                Err(err) => {
                    warn!(error = %err, "Config reload rejected");
                    error_response(id, err)
                }
            },
            Method::Shutdown => {
                self.shutdown_requested = true;
                Response::ok(id, json!({ "shutting_down": true }))
            }
        }
    }

    fn present(&mut self, mode: &str, editor: &EditorState) -> fuzzyfind_core::Result<serde_json::Value> {
        if !self.config.modes.contains_key(mode) {
            return Err(FuzzyError::UnknownMode(mode.to_string()));
        }

        let session = match self.sessions.entry(editor.workspace.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let session = MultiModeSession::from_config(
                    &self.config,
                    &self.storage,
                    Arc::clone(&self.host),
                    &editor.workspace,
                )?;
                entry.insert(session)
            }
        };

        let outcome = session.present_mode(mode, editor)?;
        Ok(json!({
            "mode": mode,
            "outcome": outcome,
            "lockfile_id": session.session().lockfile_id(),
        }))
    }

    fn select(&self, id: Option<String>, record: &str, workspace: &Path) -> Response {
        let Some(location) = parse_selection(record, workspace) else {
            return Response::error(
                id,
                "invalid_selection",
                format!("record has no path:line location: {}", record),
            );
        };
        let Some(sink) = &self.sink else {
            return Response::error(id, "sink_unavailable", "open_command is not configured");
        };
        match sink.show(&location) {
            Ok(()) => Response::ok(id, json!(location)),
            Err(err) => error_response(id, err),
        }
    }

    fn index_request(
        &mut self,
        id: Option<String>,
        now: Instant,
        trigger: fn(&mut UpdateScheduler, Instant) -> Option<UpdateJob>,
    ) -> Response {
        let Some(index) = &mut self.index else {
            return Response::error(id, "index_disabled", "index maintenance is disabled");
        };
        let job = trigger(&mut index.scheduler, now);
        let started = job.clone();
        self.dispatch(job);
        Response::ok(
            id,
            json!({
                "started": started,
                "queued": started.is_none(),
            }),
        )
    }

    fn status(&self, now: Instant) -> serde_json::Value {
        let mut sessions: Vec<serde_json::Value> = self
            .sessions
            .iter()
            .map(|(workspace, session)| {
                json!({
                    "workspace": workspace.to_string_lossy(),
                    "lockfile_id": session.session().lockfile_id(),
                    "active_mode": session.active_mode(),
                    "state": session.session().state(),
                    "last_observed_status": session.session().last_observed_status(),
                })
            })
            .collect();
        sessions.sort_by(|a, b| a["workspace"].as_str().cmp(&b["workspace"].as_str()));

        let index = self.index.as_ref().map(|index| {
            json!({
                "scheduler": index.scheduler.status(now),
                "watching": index.watcher.as_ref().map(|w| w.root().to_string_lossy().to_string()),
            })
        });

        json!({
            "workspace": self.workspace.to_string_lossy(),
            "modes": self.config.modes.keys().collect::<Vec<_>>(),
            "sessions": sessions,
            "index": index,
        })
    }
}

fn error_response(id: Option<String>, err: FuzzyError) -> Response {
    Response::error(id, err.code(), err.to_string())
}

/// Runs until `Stop` arrives or every sender is gone.
pub fn run_loop<P: Platform>(service: &mut Service<P>, events: Receiver<LoopEvent>) {
    loop {
        let now = Instant::now();
        let wait = service
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(IDLE_WAIT);

        match events.recv_timeout(wait) {
            Ok(LoopEvent::Request { request, reply }) => {
                debug!(method = ?request.method, id = ?request.id, "Daemon request received");
                let response = service.handle_request(request, Instant::now());
                let _ = reply.send(response);
            }
            Ok(LoopEvent::Fs(change)) => service.on_fs_change(change, Instant::now()),
            Ok(LoopEvent::JobDone(outcome)) => service.on_job_done(outcome, Instant::now()),
            Ok(LoopEvent::Stop) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        service.tick(Instant::now());
    }
    service.teardown();
}
