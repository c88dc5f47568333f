//! File logging for the CLI. Its stdout carries JSON for scripts, so logs go
//! to `~/.fuzzyfind/logs/fuzzyfind.log.<date>` instead.

use fs_err as fs;
use fuzzyfind_core::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "fuzzyfind.log";

/// Returns the writer guard; dropping it flushes and stops the log worker.
/// Logging is best effort: any setup failure leaves the CLI silent.
pub fn init() -> Option<WorkerGuard> {
    let logs_dir = StorageConfig::from_home().ok()?.logs_dir();
    fs::create_dir_all(&logs_dir).ok()?;

    let appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn filter() -> EnvFilter {
    let debug_enabled = std::env::var("FUZZYFIND_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
