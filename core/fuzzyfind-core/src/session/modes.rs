//! Named search modes sharing one session.
//!
//! A mode is a `CommandSource`: it turns the current editor state into the
//! search command to run and a status string. The status is compared across
//! presents to decide whether a waiting filter is still on the right query,
//! so every source should fold its own mode name into it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::command::{query_reference, quote};
use super::handle::{LaunchOptions, PresentOutcome, SessionHandle};
use super::host::TerminalHost;
use crate::config::{Config, ModeConfig, ShellDialect};
use crate::env::EnvironmentSnapshot;
use crate::error::{FuzzyError, Result};
use crate::lock::{compute_lockfile_id, MarkerDir};
use crate::patterns::RE_TEMPLATE_PLACEHOLDER;
use crate::storage::StorageConfig;

/// Editor state reported by the front-end on each present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorState {
    pub workspace: PathBuf,
    #[serde(default)]
    pub active_file: Option<String>,
}

impl EditorState {
    pub fn new(workspace: PathBuf, active_file: Option<String>) -> Self {
        Self {
            workspace,
            active_file,
        }
    }
}

/// Search command generator for one mode. Implementations must be pure apart
/// from reading `editor`.
pub trait CommandSource: Send + Sync {
    fn command(&self, editor: &EditorState) -> String;
    fn status(&self, editor: &EditorState) -> String;
}

/// `CommandSource` driven by the `{file}`/`{workspace}`/`{query}` templates in config.
#[derive(Debug, Clone)]
pub struct SearchTemplate {
    command: String,
    status: String,
    dialect: ShellDialect,
}

impl SearchTemplate {
    pub fn new(command: impl Into<String>, status: impl Into<String>, dialect: ShellDialect) -> Self {
        Self {
            command: command.into(),
            status: status.into(),
            dialect,
        }
    }

    pub fn from_config(mode: &ModeConfig, dialect: ShellDialect) -> Self {
        Self::new(mode.command.clone(), mode.status.clone(), dialect)
    }
}

fn workspace_str(editor: &EditorState) -> String {
    editor.workspace.to_string_lossy().to_string()
}

impl CommandSource for SearchTemplate {
    fn command(&self, editor: &EditorState) -> String {
        RE_TEMPLATE_PLACEHOLDER
            .replace_all(&self.command, |caps: &regex::Captures<'_>| match &caps[1] {
                "file" => quote(self.dialect, editor.active_file.as_deref().unwrap_or("")),
                "workspace" => quote(self.dialect, &workspace_str(editor)),
                "query" => query_reference(self.dialect).to_string(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }

    fn status(&self, editor: &EditorState) -> String {
        RE_TEMPLATE_PLACEHOLDER
            .replace_all(&self.status, |caps: &regex::Captures<'_>| match &caps[1] {
                "file" => editor.active_file.clone().unwrap_or_default(),
                "workspace" => workspace_str(editor),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// One `SessionHandle` switched between named modes.
pub struct MultiModeSession {
    session: SessionHandle,
    modes: HashMap<String, Arc<dyn CommandSource>>,
    active_mode: Option<String>,
}

impl MultiModeSession {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            modes: HashMap::new(),
            active_mode: None,
        }
    }

    /// Builds the session and registers every configured mode.
    pub fn from_config(
        config: &Config,
        storage: &StorageConfig,
        host: Arc<dyn TerminalHost>,
        workspace: &Path,
    ) -> Result<Self> {
        let markers = match &config.session.markers_dir {
            Some(dir) => MarkerDir::new(PathBuf::from(dir)),
            None => MarkerDir::new(storage.markers_dir()),
        };
        let launch = LaunchOptions {
            env: EnvironmentSnapshot::from_process(&config.env),
            cwd: workspace.to_path_buf(),
            dialect: config.shell,
            filter: config.filter.clone(),
            interrupt_grace: config.session.interrupt_grace(),
        };
        let lockfile_id = compute_lockfile_id(&config.session.name, workspace);
        let session = SessionHandle::new(
            config.session.name.clone(),
            lockfile_id,
            host,
            markers,
            launch,
        );

        let mut multi = Self::new(session);
        for (name, mode) in &config.modes {
            multi.add_mode(name, Arc::new(SearchTemplate::from_config(mode, config.shell)))?;
        }
        Ok(multi)
    }

    /// Registers a mode. Registering the same name twice is an error.
    pub fn add_mode(&mut self, name: &str, source: Arc<dyn CommandSource>) -> Result<()> {
        if self.modes.contains_key(name) {
            return Err(FuzzyError::DuplicateMode(name.to_string()));
        }
        self.modes.insert(name.to_string(), source);
        Ok(())
    }

    /// Switches the session's command source. Does not touch the terminal;
    /// the next `present` decides whether the switch needs a restart.
    pub fn select_mode(&mut self, name: &str) -> Result<()> {
        let source = self
            .modes
            .get(name)
            .cloned()
            .ok_or_else(|| FuzzyError::UnknownMode(name.to_string()))?;
        self.session.set_source(source);
        self.active_mode = Some(name.to_string());
        Ok(())
    }

    pub fn present(&mut self, editor: &EditorState) -> Result<PresentOutcome> {
        let outcome = self.session.present(editor)?;
        tracing::debug!(mode = ?self.active_mode, outcome = ?outcome, "Mode presented");
        Ok(outcome)
    }

    /// `select_mode` followed by `present`.
    pub fn present_mode(&mut self, name: &str, editor: &EditorState) -> Result<PresentOutcome> {
        self.select_mode(name)?;
        self.present(editor)
    }

    pub fn active_mode(&self) -> Option<&str> {
        self.active_mode.as_deref()
    }

    pub fn mode_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn dispose(&mut self) {
        self.session.dispose();
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;

    /// Source returning constant strings.
    pub struct FixedSource {
        pub command: String,
        pub status: String,
    }

    impl FixedSource {
        pub fn new(command: &str, status: &str) -> Self {
            Self {
                command: command.to_string(),
                status: status.to_string(),
            }
        }
    }

    impl CommandSource for FixedSource {
        fn command(&self, _editor: &EditorState) -> String {
            self.command.clone()
        }

        fn status(&self, _editor: &EditorState) -> String {
            self.status.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::host::test_utils::{FakeHost, HostCall};
    use super::test_utils::FixedSource;
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn multi(temp: &Path, host: Arc<FakeHost>) -> MultiModeSession {
        let launch = LaunchOptions {
            env: EnvironmentSnapshot::default(),
            cwd: temp.to_path_buf(),
            dialect: ShellDialect::Posix,
            filter: crate::config::FilterConfig::default(),
            interrupt_grace: Duration::ZERO,
        };
        let session = SessionHandle::new(
            "main",
            "main-1",
            host,
            MarkerDir::new(temp.join("markers")),
            launch,
        );
        MultiModeSession::new(session)
    }

    #[test]
    fn duplicate_mode_is_rejected() {
        let temp = tempdir().unwrap();
        let mut m = multi(temp.path(), Arc::new(FakeHost::new()));
        m.add_mode("findSymbol", Arc::new(FixedSource::new("a", "a")))
            .unwrap();
        assert!(matches!(
            m.add_mode("findSymbol", Arc::new(FixedSource::new("b", "b"))),
            Err(FuzzyError::DuplicateMode(_))
        ));
    }

    #[test]
    fn unknown_mode_is_rejected_and_keeps_previous_selection() {
        let temp = tempdir().unwrap();
        let mut m = multi(temp.path(), Arc::new(FakeHost::new()));
        m.add_mode("findLine", Arc::new(FixedSource::new("a", "a")))
            .unwrap();
        m.select_mode("findLine").unwrap();

        assert!(matches!(
            m.select_mode("nope"),
            Err(FuzzyError::UnknownMode(_))
        ));
        assert_eq!(m.active_mode(), Some("findLine"));
    }

    #[test]
    fn first_present_injects_selected_mode_command() {
        let temp = tempdir().unwrap();
        let host = Arc::new(FakeHost::new());
        let mut m = multi(temp.path(), host.clone());
        m.add_mode("findSymbol", Arc::new(FixedSource::new("cmdA", "statusA")))
            .unwrap();
        m.select_mode("findSymbol").unwrap();

        let editor = EditorState::new(temp.path().to_path_buf(), None);
        assert_eq!(m.present(&editor).unwrap(), PresentOutcome::Spawned);
        assert_eq!(host.calls()[0], HostCall::Create("main-1".to_string()));
        assert!(host.sent_texts()[0].contains("export FUZZYFIND_SEARCH='cmdA'"));
    }

    #[test]
    fn switching_mode_alone_does_not_touch_terminal() {
        let temp = tempdir().unwrap();
        let host = Arc::new(FakeHost::new());
        let mut m = multi(temp.path(), host.clone());
        m.add_mode("a", Arc::new(FixedSource::new("cmdA", "sA"))).unwrap();
        m.add_mode("b", Arc::new(FixedSource::new("cmdB", "sB"))).unwrap();
        let editor = EditorState::new(temp.path().to_path_buf(), None);
        m.present_mode("a", &editor).unwrap();
        MarkerDir::new(temp.path().join("markers")).create("main-1");
        host.clear();

        m.select_mode("b").unwrap();
        assert!(host.calls().is_empty());

        assert_eq!(m.present(&editor).unwrap(), PresentOutcome::Restarted);
        assert!(host.sent_texts()[0].contains("'cmdB'"));
    }

    #[test]
    fn template_expands_placeholders() {
        let template = SearchTemplate::new(
            "rg -- {query} {file}",
            "find-line:{file}",
            ShellDialect::Posix,
        );
        let editor = EditorState::new(PathBuf::from("/w"), Some("src/it's.c".to_string()));

        assert_eq!(template.command(&editor), r#"rg -- "$1" 'src/it'\''s.c'"#);
        assert_eq!(template.status(&editor), "find-line:src/it's.c");
    }

    #[test]
    fn template_status_tracks_workspace() {
        let template = SearchTemplate::new("x {workspace}", "in-files:{workspace}", ShellDialect::Posix);
        let editor = EditorState::new(PathBuf::from("/w"), None);
        assert_eq!(template.command(&editor), "x '/w'");
        assert_eq!(template.status(&editor), "in-files:/w");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let template = SearchTemplate::new("echo {other}", "{other}", ShellDialect::Posix);
        let editor = EditorState::new(PathBuf::from("/w"), None);
        assert_eq!(template.command(&editor), "echo {other}");
        assert_eq!(template.status(&editor), "{other}");
    }

    #[test]
    fn from_config_registers_default_modes() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let m = MultiModeSession::from_config(
            &Config::default(),
            &storage,
            Arc::new(FakeHost::new()),
            temp.path(),
        )
        .unwrap();
        assert_eq!(
            m.mode_names(),
            vec![
                "find-line",
                "find-line-in-files",
                "find-symbol",
                "find-symbol-in-files"
            ]
        );
        assert!(m.session().lockfile_id().starts_with("fuzzyfind-"));
    }
}
