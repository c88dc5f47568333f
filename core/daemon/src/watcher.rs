//! File tree watcher feeding the event loop.
//!
//! notify delivers events on its own thread; we translate them into
//! workspace-relative `FsChange`s and forward them. Classification happens on
//! the loop thread, so this layer never drops anything but paths outside the
//! workspace and pure access events.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use fuzzyfind_core::{FsChange, FsChangeKind};
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::service::LoopEvent;

/// Keeps the OS watcher alive. Dropping it stops delivery.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl ChangeWatcher {
    pub fn start(root: &Path, events: Sender<LoopEvent>) -> Result<Self, String> {
        let watch_root = root.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in changes_from_event(&watch_root, &event) {
                        if events.send(LoopEvent::Fs(change)).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => warn!(error = %err, "File watcher error"),
            },
            Config::default(),
        )
        .map_err(|err| format!("Failed to create watcher: {}", err))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|err| format!("Failed to watch {}: {}", root.display(), err))?;
        debug!(root = %root.display(), "Watching workspace");

        Ok(Self {
            _watcher: watcher,
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Renames count as creates: both sides of a move change the file set.
pub fn changes_from_event(root: &Path, event: &Event) -> Vec<FsChange> {
    let kind = match &event.kind {
        EventKind::Create(_) => FsChangeKind::Create,
        EventKind::Remove(_) => FsChangeKind::Delete,
        EventKind::Modify(ModifyKind::Name(_)) => FsChangeKind::Create,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => FsChangeKind::Change,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter_map(|path| relative_path(root, path))
        .map(|path| FsChange::new(kind, path))
        .collect()
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let relative = relative.to_string_lossy().replace('\\', "/");
    if relative.is_empty() {
        None
    } else {
        Some(relative)
    }
}
