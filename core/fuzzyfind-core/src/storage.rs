//! Storage configuration and path management for fuzzyfind.
//!
//! All file paths used by the daemon and the CLI are decided here so tests can
//! inject a temp root with `StorageConfig::with_root()`.
//!
//! ```text
//! ~/.fuzzyfind/
//! ├── config.json   # user configuration (optional)
//! ├── daemon.sock   # daemon request socket
//! ├── markers/      # per-session "query in progress" lock files
//! └── logs/         # CLI rolling logs
//! ```

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{FuzzyError, Result};

const ROOT_DIR: &str = ".fuzzyfind";
const SOCKET_ENV: &str = "FUZZYFIND_SOCKET";
const CONFIG_ENV: &str = "FUZZYFIND_CONFIG";

/// Central configuration for all fuzzyfind storage paths.
///
/// Production code uses `StorageConfig::from_home()` which points to `~/.fuzzyfind/`.
/// Tests use `StorageConfig::with_root(temp_dir)` for isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves `~/.fuzzyfind`.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(FuzzyError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(ROOT_DIR),
        })
    }

    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to config.json, honoring `FUZZYFIND_CONFIG`.
    pub fn config_file(&self) -> PathBuf {
        match env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => self.root.join("config.json"),
        }
    }

    /// Path to the daemon socket, honoring `FUZZYFIND_SOCKET`.
    pub fn socket_file(&self) -> PathBuf {
        match env::var(SOCKET_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => self.root.join("daemon.sock"),
        }
    }

    /// Default directory for session marker files.
    pub fn markers_dir(&self) -> PathBuf {
        self.root.join("markers")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
