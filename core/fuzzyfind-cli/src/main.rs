//! fuzzyfind: command-line triggers for the fuzzyfind daemon.
//!
//! Editors bind these to keys; the filter tool calls `select` from its enter
//! binding. Each subcommand is one daemon request whose payload is printed as
//! JSON on stdout.
//!
//! ## Subcommands
//!
//! - `present`: show a search mode for the active file
//! - `select`: open the location named by a filter result line
//! - `rebuild`, `create-index`: index maintenance
//! - `reload-config`, `status`, `health`, `shutdown`: daemon control

mod daemon_client;
mod logging;

use clap::{Parser, Subcommand};
use fs_err as fs;
use fuzzyfind_daemon_protocol::Method;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fuzzyfind")]
#[command(about = "Fuzzy search sessions for your editor")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Present a search mode in the shared terminal session
    Present {
        /// Mode name (e.g. find-line, find-symbol-in-files)
        #[arg(value_name = "MODE")]
        mode: String,

        /// Active file, absolute or relative to the workspace
        #[arg(long)]
        file: Option<String>,

        /// Workspace root (defaults to the daemon's workspace)
        #[arg(long)]
        workspace: Option<PathBuf>,
    },

    /// Open the location in a filter result line (called by the filter tool)
    Select {
        /// Result line, e.g. `src/main.rs:12:4:fn main()`
        #[arg(value_name = "RECORD")]
        record: String,

        /// Workspace used to resolve relative paths
        #[arg(long)]
        workspace: Option<PathBuf>,
    },

    /// Run a full index update now
    Rebuild,

    /// Build the index from scratch
    CreateIndex,

    /// Re-read config.json; open sessions are closed
    ReloadConfig,

    /// Print daemon status
    Status,

    /// Check that the daemon is up
    Health,

    /// Stop the daemon
    Shutdown,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let (method, params) = match request_for(cli.command) {
        Ok(request) => request,
        Err(err) => {
            tracing::error!(error = %err, "Invalid arguments");
            eprintln!("fuzzyfind: {}", err);
            std::process::exit(2);
        }
    };

    match daemon_client::call(method, params) {
        Ok(data) => {
            let rendered =
                serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
            println!("{}", rendered);
        }
        Err(err) => {
            tracing::error!(error = %err, method = ?method, "fuzzyfind request failed");
            eprintln!("fuzzyfind: {}", err);
            std::process::exit(1);
        }
    }
}

fn request_for(command: Commands) -> Result<(Method, Option<Value>), String> {
    let request = match command {
        Commands::Present {
            mode,
            file,
            workspace,
        } => {
            let mut params = json!({ "mode": mode });
            if let Some(workspace) = absolute_workspace(workspace)? {
                params["workspace"] = Value::String(workspace);
            }
            if let Some(file) = file {
                params["active_file"] = Value::String(file);
            }
            (Method::Present, Some(params))
        }
        Commands::Select { record, workspace } => {
            let mut params = json!({ "record": record });
            if let Some(workspace) = absolute_workspace(workspace)? {
                params["workspace"] = Value::String(workspace);
            }
            (Method::Select, Some(params))
        }
        Commands::Rebuild => (Method::ForceFullIndex, None),
        Commands::CreateIndex => (Method::CreateIndex, None),
        Commands::ReloadConfig => (Method::ReloadConfig, None),
        Commands::Status => (Method::GetStatus, None),
        Commands::Health => (Method::GetHealth, None),
        Commands::Shutdown => (Method::Shutdown, None),
    };
    Ok(request)
}

/// The daemon only accepts absolute workspace roots.
fn absolute_workspace(path: Option<PathBuf>) -> Result<Option<String>, String> {
    match path {
        None => Ok(None),
        Some(path) => fs::canonicalize(&path)
            .map(|p| Some(p.to_string_lossy().into_owned()))
            .map_err(|err| format!("Invalid workspace: {}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn present_sends_mode_file_and_canonical_workspace() {
        let temp = TempDir::new().unwrap();
        let (method, params) = request_for(Commands::Present {
            mode: "find-line".to_string(),
            file: Some("src/lib.rs".to_string()),
            workspace: Some(temp.path().to_path_buf()),
        })
        .unwrap();

        let params = params.unwrap();
        assert_eq!(method, Method::Present);
        assert_eq!(params["mode"], "find-line");
        assert_eq!(params["active_file"], "src/lib.rs");
        let expected = std::fs::canonicalize(temp.path()).unwrap();
        assert_eq!(params["workspace"], expected.to_string_lossy().as_ref());
    }

    #[test]
    fn present_without_workspace_leaves_it_to_daemon() {
        let (_, params) = request_for(Commands::Present {
            mode: "find-symbol".to_string(),
            file: None,
            workspace: None,
        })
        .unwrap();

        let params = params.unwrap();
        assert!(params.get("workspace").is_none());
        assert!(params.get("active_file").is_none());
    }

    #[test]
    fn missing_workspace_is_rejected_locally() {
        let temp = TempDir::new().unwrap();
        let result = request_for(Commands::Select {
            record: "a.rs:1".to_string(),
            workspace: Some(temp.path().join("missing")),
        });
        assert!(result.is_err());
    }

    #[test]
    fn maintenance_commands_map_to_methods() {
        let cases = [
            (Commands::Rebuild, Method::ForceFullIndex),
            (Commands::CreateIndex, Method::CreateIndex),
            (Commands::ReloadConfig, Method::ReloadConfig),
            (Commands::Status, Method::GetStatus),
            (Commands::Health, Method::GetHealth),
            (Commands::Shutdown, Method::Shutdown),
        ];
        for (command, expected) in cases {
            let (method, params) = request_for(command).unwrap();
            assert_eq!(method, expected);
            assert!(params.is_none());
        }
    }

    #[test]
    fn cli_parses_present_flags() {
        let cli = Cli::try_parse_from([
            "fuzzyfind",
            "present",
            "find-line-in-files",
            "--file",
            "README.md",
        ])
        .unwrap();
        match cli.command {
            Commands::Present { mode, file, .. } => {
                assert_eq!(mode, "find-line-in-files");
                assert_eq!(file.as_deref(), Some("README.md"));
            }
            _ => panic!("expected present"),
        }
    }
}
