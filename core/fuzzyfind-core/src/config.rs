//! Configuration loading.
//!
//! The configuration is an immutable snapshot. A config change produces a new
//! `Config` and the daemon disposes and recreates every dependent session
//! instead of mutating anything in place.
//!
//! Missing file → defaults. Malformed file → `FuzzyError::ConfigMalformed`.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use crate::error::{FuzzyError, Result};
use crate::storage::StorageConfig;

/// Shell syntax used for the command line typed into the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellDialect {
    #[default]
    Posix,
    Powershell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Command the selection binding pipes the chosen record to.
    pub select_command: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            program: "fzf".to_string(),
            args: vec![
                "--disabled".to_string(),
                "--ansi".to_string(),
                "--layout=reverse".to_string(),
            ],
            select_command: "fuzzyfind select".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub name: String,
    pub tmux_program: String,
    /// Delay between interrupting a live session and injecting the new
    /// command. Zero means fire-and-forget.
    pub interrupt_grace_ms: u64,
    /// Overrides the marker directory (default `~/.fuzzyfind/markers`).
    pub markers_dir: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "fuzzyfind".to_string(),
            tmux_program: "tmux".to_string(),
            interrupt_grace_ms: 0,
            markers_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_millis(self.interrupt_grace_ms)
    }
}

/// Search command and status templates for one mode.
///
/// Placeholders: `{file}` (active document), `{workspace}` (workspace root),
/// `{query}` (the live filter query, passed as a positional shell argument).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub command: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub enabled: bool,
    pub watch_glob: String,
    pub ignore_globs: Vec<String>,
    pub dirty_threshold: usize,
    /// Seconds; coerced to whole milliseconds by `debounce()`.
    pub debounce_seconds: f64,
    /// Build the index from scratch when the daemon starts.
    pub build_on_start: bool,
    pub create: Vec<String>,
    pub update_all: Vec<String>,
    pub update_file: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            watch_glob: "**/*.{c,h,cc,cpp,hpp,cxx,hxx,java,py,go,rs,js,ts,php,rb}".to_string(),
            ignore_globs: vec![
                "**/.git/**".to_string(),
                "**/GTAGS".to_string(),
                "**/GRTAGS".to_string(),
                "**/GPATH".to_string(),
            ],
            dirty_threshold: 10,
            debounce_seconds: 1.0,
            build_on_start: false,
            create: vec!["gtags".to_string()],
            update_all: vec!["global".to_string(), "-u".to_string()],
            update_file: vec![
                "global".to_string(),
                "--single-update".to_string(),
                "{path}".to_string(),
            ],
        }
    }
}

impl IndexConfig {
    /// Debounce delay, coerced from seconds. Negative or non-finite input is zero.
    pub fn debounce(&self) -> Duration {
        let secs = self.debounce_seconds;
        if !secs.is_finite() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_millis((secs * 1000.0).round() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment overrides for new terminals. `null` removes a variable.
    pub env: BTreeMap<String, Option<String>>,
    pub shell: ShellDialect,
    pub filter: FilterConfig,
    pub session: SessionConfig,
    pub modes: BTreeMap<String, ModeConfig>,
    pub index: IndexConfig,
    /// Command run to show a selected location. `{file}`, `{line}`, `{column}`.
    pub open_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            shell: ShellDialect::default(),
            filter: FilterConfig::default(),
            session: SessionConfig::default(),
            modes: default_modes(),
            index: IndexConfig::default(),
            open_command: vec![
                "code".to_string(),
                "--goto".to_string(),
                "{file}:{line}:{column}".to_string(),
            ],
        }
    }
}

fn default_modes() -> BTreeMap<String, ModeConfig> {
    let mut modes = BTreeMap::new();
    modes.insert(
        "find-line".to_string(),
        ModeConfig {
            command: "rg --with-filename --line-number --column --no-heading --color=always --smart-case -- {query} {file}"
                .to_string(),
            status: "find-line:{file}".to_string(),
        },
    );
    modes.insert(
        "find-line-in-files".to_string(),
        ModeConfig {
            command: "rg --with-filename --line-number --column --no-heading --color=always --smart-case -- {query} {workspace}"
                .to_string(),
            status: "find-line-in-files:{workspace}".to_string(),
        },
    );
    modes.insert(
        "find-symbol".to_string(),
        ModeConfig {
            command: "global --result=grep -f {file} | grep -i -- {query}".to_string(),
            status: "find-symbol:{file}".to_string(),
        },
    );
    modes.insert(
        "find-symbol-in-files".to_string(),
        ModeConfig {
            command: "global --result=grep -i -x -- \".*\"{query}\".*\"".to_string(),
            status: "find-symbol-in-files:{workspace}".to_string(),
        },
    );
    modes
}

impl Config {
    /// Loads the config from `storage.config_file()`, defaults when missing.
    pub fn load(storage: &StorageConfig) -> Result<Self> {
        Self::load_from(&storage.config_file())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(FuzzyError::Io {
                    context: format!("reading {}", path.display()),
                    source: err,
                })
            }
        };

        let config: Config =
            serde_json::from_str(&content).map_err(|e| FuzzyError::ConfigMalformed {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config, logging and falling back to defaults on any error.
    pub fn load_or_default(storage: &StorageConfig) -> Self {
        Self::load(storage).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Failed to load config; using defaults");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| FuzzyError::Json {
            context: "serializing config".to_string(),
            source: e,
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FuzzyError::ConfigWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(path, content).map_err(|e| FuzzyError::ConfigWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.index.dirty_threshold == 0 {
            return Err(FuzzyError::InvalidConfig(
                "index.dirty_threshold must be positive".to_string(),
            ));
        }
        if self.filter.program.trim().is_empty() {
            return Err(FuzzyError::InvalidConfig(
                "filter.program is required".to_string(),
            ));
        }
        if self.session.name.trim().is_empty() {
            return Err(FuzzyError::InvalidConfig(
                "session.name is required".to_string(),
            ));
        }
        Ok(())
    }
}
