//! Error types for fuzzyfind-core operations.
//! Marker and terminal I/O failures that the session lifecycle treats as
//! "finished" never reach this type; they are logged and swallowed.

use std::path::PathBuf;

/// All errors that can occur in fuzzyfind-core operations.
#[derive(Debug, thiserror::Error)]
pub enum FuzzyError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration write failed: {path}: {source}")]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid glob pattern {pattern:?}: {details}")]
    InvalidGlob { pattern: String, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ─────────────────────────────────────────────────────────────────────
    // Mode Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Mode already registered: {0}")]
    DuplicateMode(String),

    #[error("No mode selected for session {0}")]
    NoModeSelected(String),

    // ─────────────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session {0} has been disposed")]
    SessionDisposed(String),

    #[error("Terminal host error: {operation}: {details}")]
    Terminal { operation: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Command Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Empty command template: {0}")]
    EmptyCommand(String),
}

impl FuzzyError {
    /// Stable machine-readable code used in daemon protocol errors.
    pub fn code(&self) -> &'static str {
        match self {
            FuzzyError::HomeDirNotFound => "home_not_found",
            FuzzyError::ConfigMalformed { .. } => "config_malformed",
            FuzzyError::ConfigWriteFailed { .. } => "config_write_failed",
            FuzzyError::InvalidGlob { .. } => "invalid_glob",
            FuzzyError::InvalidConfig(_) => "invalid_config",
            FuzzyError::UnknownMode(_) => "unknown_mode",
            FuzzyError::DuplicateMode(_) => "duplicate_mode",
            FuzzyError::NoModeSelected(_) => "no_mode_selected",
            FuzzyError::SessionDisposed(_) => "session_disposed",
            FuzzyError::Terminal { .. } => "terminal_error",
            FuzzyError::Io { .. } => "io_error",
            FuzzyError::Json { .. } => "json_error",
            FuzzyError::CommandFailed { .. } => "command_failed",
            FuzzyError::EmptyCommand(_) => "empty_command",
        }
    }
}

/// Convenience type alias for Results using FuzzyError.
pub type Result<T> = std::result::Result<T, FuzzyError>;

impl From<FuzzyError> for String {
    fn from(err: FuzzyError) -> String {
        err.to_string()
    }
}
