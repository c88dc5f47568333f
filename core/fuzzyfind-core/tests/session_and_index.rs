//! End-to-end scenarios through the public API: a configured multi-mode
//! session against a recording terminal host, and the change-tracking
//! pipeline feeding the update scheduler.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fuzzyfind_core::{
    ChangeClassifier, Config, DirtyTracker, EditorState, EnvironmentSnapshot, FsChange,
    FsChangeKind, FuzzyError, JobOutcome, MarkerDir, MultiModeSession, PathClass,
    PresentOutcome, StorageConfig, TerminalHost, TerminalId, UpdateJob, UpdateScheduler,
};
use tempfile::TempDir;

#[derive(Default)]
struct RecordingHost {
    created: AtomicUsize,
    interrupts: AtomicUsize,
    sent: Mutex<Vec<String>>,
    disposed: Mutex<Vec<TerminalId>>,
}

impl TerminalHost for RecordingHost {
    fn create(
        &self,
        name: &str,
        _env: &EnvironmentSnapshot,
        _cwd: &Path,
    ) -> fuzzyfind_core::Result<TerminalId> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(TerminalId(format!("{}-{}", name, n)))
    }

    fn has_exited(&self, id: &TerminalId) -> bool {
        self.disposed.lock().unwrap().contains(id)
    }

    fn send_text(&self, _id: &TerminalId, text: &str) -> fuzzyfind_core::Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn interrupt(&self, _id: &TerminalId) -> fuzzyfind_core::Result<()> {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn focus(&self, _id: &TerminalId) -> fuzzyfind_core::Result<()> {
        Ok(())
    }

    fn dispose(&self, id: &TerminalId) {
        self.disposed.lock().unwrap().push(id.clone());
    }
}

struct Fixture {
    _temp: TempDir,
    storage: StorageConfig,
    workspace: std::path::PathBuf,
    host: Arc<RecordingHost>,
    session: MultiModeSession,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let storage = StorageConfig::with_root(temp.path().join("state"));
    let workspace = temp.path().join("repo");
    std::fs::create_dir_all(&workspace).unwrap();

    let host = Arc::new(RecordingHost::default());
    let session =
        MultiModeSession::from_config(&Config::default(), &storage, host.clone(), &workspace)
            .unwrap();
    Fixture {
        _temp: temp,
        storage,
        workspace,
        host,
        session,
    }
}

fn editor(f: &Fixture, file: &str) -> EditorState {
    EditorState::new(f.workspace.clone(), Some(file.to_string()))
}

/// Stands in for the injected command line touching the marker while the
/// filter runs.
fn mark_filter_running(f: &Fixture) {
    let markers = MarkerDir::new(f.storage.markers_dir());
    assert!(markers.create(f.session.session().lockfile_id()));
}

#[test]
fn configured_modes_are_registered() {
    let f = fixture();
    assert_eq!(
        f.session.mode_names(),
        vec![
            "find-line",
            "find-line-in-files",
            "find-symbol",
            "find-symbol-in-files"
        ]
    );
    assert_eq!(f.session.active_mode(), None);
}

#[test]
fn present_without_mode_is_an_error() {
    let mut f = fixture();
    let editor = editor(&f, "src/main.c");
    let err = f.session.present(&editor).unwrap_err();
    assert!(matches!(err, FuzzyError::NoModeSelected(_)));
}

#[test]
fn duplicate_and_unknown_modes_are_rejected() {
    let mut f = fixture();
    let err = f.session.select_mode("find-everything").unwrap_err();
    assert!(matches!(err, FuzzyError::UnknownMode(_)));

    let config = Config::default();
    let again = fuzzyfind_core::SearchTemplate::from_config(&config.modes["find-line"], config.shell);
    let err = f.session.add_mode("find-line", Arc::new(again)).unwrap_err();
    assert!(matches!(err, FuzzyError::DuplicateMode(_)));
}

#[test]
fn present_spawns_then_reuses_running_filter() {
    let mut f = fixture();
    f.session.select_mode("find-line").unwrap();

    let outcome = f.session.present(&editor(&f, "src/main.c")).unwrap();
    assert_eq!(outcome, PresentOutcome::Spawned);
    assert_eq!(f.host.created.load(Ordering::SeqCst), 1);
    assert_eq!(f.host.sent.lock().unwrap().len(), 1);

    mark_filter_running(&f);
    let outcome = f.session.present(&editor(&f, "src/main.c")).unwrap();
    assert_eq!(outcome, PresentOutcome::Reused);
    assert_eq!(f.host.interrupts.load(Ordering::SeqCst), 0);
    assert_eq!(f.host.sent.lock().unwrap().len(), 1);
}

#[test]
fn switching_file_or_mode_restarts_the_filter() {
    let mut f = fixture();
    f.session.select_mode("find-line").unwrap();
    f.session.present(&editor(&f, "src/main.c")).unwrap();

    mark_filter_running(&f);
    let outcome = f.session.present(&editor(&f, "src/util.c")).unwrap();
    assert_eq!(outcome, PresentOutcome::Restarted);

    mark_filter_running(&f);
    f.session.select_mode("find-line-in-files").unwrap();
    let outcome = f.session.present(&editor(&f, "src/util.c")).unwrap();
    assert_eq!(outcome, PresentOutcome::Restarted);

    assert_eq!(f.host.created.load(Ordering::SeqCst), 1);
    assert_eq!(f.host.interrupts.load(Ordering::SeqCst), 2);
    assert_eq!(f.host.sent.lock().unwrap().len(), 3);
}

#[test]
fn exited_filter_is_restarted_even_when_status_matches() {
    let mut f = fixture();
    f.session.select_mode("find-symbol").unwrap();
    f.session.present(&editor(&f, "src/main.c")).unwrap();

    // No marker: the filter has already exited back to the shell.
    let outcome = f.session.present(&editor(&f, "src/main.c")).unwrap();
    assert_eq!(outcome, PresentOutcome::Restarted);
}

#[test]
fn dispose_releases_terminal_and_marker() {
    let mut f = fixture();
    f.session.select_mode("find-line").unwrap();
    f.session.present(&editor(&f, "src/main.c")).unwrap();
    mark_filter_running(&f);

    let lockfile_id = f.session.session().lockfile_id().to_string();
    f.session.dispose();

    let markers = MarkerDir::new(f.storage.markers_dir());
    assert!(!markers.exists(&lockfile_id));
    assert_eq!(f.host.disposed.lock().unwrap().len(), 1);
    let err = f.session.present(&editor(&f, "src/main.c")).unwrap_err();
    assert!(matches!(err, FuzzyError::SessionDisposed(_)));
}

#[test]
fn default_globs_ignore_readme_and_git() {
    let config = Config::default();
    let classifier = ChangeClassifier::from_config(&config.index).unwrap();
    assert_eq!(classifier.classify("src/main.c"), PathClass::Watched);
    assert_eq!(classifier.classify("README.md"), PathClass::Unwatched);
    assert_eq!(classifier.classify(".git/index.c"), PathClass::Ignored);
}

fn scheduler(threshold: usize, delay: Duration) -> UpdateScheduler {
    let classifier = ChangeClassifier::new("**/*.c", &["**/.git/**"]).unwrap();
    UpdateScheduler::new(DirtyTracker::new(classifier, threshold), delay)
}

#[test]
fn threshold_turns_many_edits_into_one_full_update() {
    let mut scheduler = scheduler(10, Duration::from_millis(500));
    let t0 = Instant::now();
    for i in 0..10 {
        scheduler.record(&FsChange::new(FsChangeKind::Change, format!("f{i}.c")), t0);
    }
    let job = scheduler.fire_if_due(t0 + Duration::from_millis(500));
    assert_eq!(job, Some(UpdateJob::Full));
}

#[test]
fn below_threshold_updates_files_in_order() {
    let mut scheduler = scheduler(10, Duration::from_millis(500));
    let t0 = Instant::now();
    for path in ["b.c", "a.c", "b.c", "notes.txt"] {
        scheduler.record(&FsChange::new(FsChangeKind::Change, path), t0);
    }

    let first = scheduler.fire_if_due(t0 + Duration::from_millis(500));
    assert_eq!(first, Some(UpdateJob::File("b.c".to_string())));
    let second = scheduler.job_finished(JobOutcome::succeeded(UpdateJob::File("b.c".into())), t0);
    assert_eq!(second, Some(UpdateJob::File("a.c".to_string())));
    let done = scheduler.job_finished(JobOutcome::succeeded(UpdateJob::File("a.c".into())), t0);
    assert_eq!(done, None);
    assert!(!scheduler.is_updating());
}

#[test]
fn debounce_waits_for_quiet_period() {
    let mut scheduler = scheduler(10, Duration::from_millis(500));
    let t0 = Instant::now();
    scheduler.record(&FsChange::new(FsChangeKind::Change, "a.c"), t0);

    let t1 = t0 + Duration::from_millis(400);
    assert_eq!(scheduler.fire_if_due(t1), None);
    scheduler.record(&FsChange::new(FsChangeKind::Change, "a.c"), t1);

    assert_eq!(scheduler.fire_if_due(t0 + Duration::from_millis(800)), None);
    assert_eq!(
        scheduler.fire_if_due(t1 + Duration::from_millis(500)),
        Some(UpdateJob::File("a.c".to_string()))
    );
}

#[test]
fn failed_job_still_lets_the_next_run_start() {
    let mut scheduler = scheduler(10, Duration::ZERO);
    let t0 = Instant::now();
    let job = scheduler.force_full_update(t0);
    assert_eq!(job, Some(UpdateJob::Full));

    let next =
        scheduler.job_finished(JobOutcome::failed(UpdateJob::Full, "global: not found"), t0);
    assert_eq!(next, None);

    scheduler.record(&FsChange::new(FsChangeKind::Create, "new.c"), t0);
    assert_eq!(scheduler.fire_if_due(t0), Some(UpdateJob::Full));
}
