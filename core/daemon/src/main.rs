//! fuzzyfind daemon entrypoint.
//!
//! A small, single-writer service that owns the interactive sessions and the
//! index scheduler for one workspace: a socket listener with strict request
//! validation in front of a single-threaded event loop.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use fuzzyfind_core::{Config, StorageConfig};
use fuzzyfind_daemon_protocol::{ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod platform;
mod service;
mod watcher;

use platform::SystemPlatform;
use service::{run_loop, LoopEvent, Service};

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;
/// A present can block on tmux; keep this well above its worst case.
const REPLY_TIMEOUT_SECS: u64 = 30;

#[derive(Parser)]
#[command(name = "fuzzyfind-daemon")]
#[command(about = "Session and index daemon for fuzzyfind")]
#[command(version)]
struct Cli {
    /// Workspace root to watch and index (defaults to the current directory)
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let workspace = match resolve_workspace(cli.workspace) {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve workspace");
            std::process::exit(1);
        }
    };

    let storage = match StorageConfig::from_home() {
        Ok(storage) => storage,
        Err(err) => {
            error!(error = %err, "Failed to resolve storage paths");
            std::process::exit(1);
        }
    };
    let socket_path = storage.socket_file();

    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    let config = Config::load_or_default(&storage);

    let (events_tx, events_rx) = mpsc::channel::<LoopEvent>();
    let mut service = Service::new(
        SystemPlatform::new(events_tx.clone()),
        storage,
        config,
        workspace,
    );
    service.startup(Instant::now());
    info!(
        path = %socket_path.display(),
        workspace = %service.workspace().display(),
        "fuzzyfind daemon started"
    );

    spawn_acceptor(listener, events_tx);
    run_loop(&mut service, events_rx);

    let _ = fs::remove_file(&socket_path);
    info!("fuzzyfind daemon stopped");
}

fn init_logging() {
    let debug_enabled = env::var("FUZZYFIND_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_workspace(arg: Option<PathBuf>) -> Result<PathBuf, String> {
    let path = match arg {
        Some(path) => path,
        None => env::current_dir().map_err(|err| format!("No current directory: {}", err))?,
    };
    fs::canonicalize(&path).map_err(|err| format!("Invalid workspace {}: {}", path.display(), err))
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn spawn_acceptor(listener: UnixListener, events: Sender<LoopEvent>) {
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let events = events.clone();
                    thread::spawn(move || handle_connection(stream, events));
                }
                Err(err) => {
                    warn!(error = %err, "Failed to accept daemon connection");
                }
            }
        }
    });
}

fn handle_connection(mut stream: UnixStream, events: Sender<LoopEvent>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    let id = request.id.clone();
    let is_shutdown = request.method == Method::Shutdown;
    let (reply_tx, reply_rx) = mpsc::channel();
    if events
        .send(LoopEvent::Request {
            request,
            reply: reply_tx,
        })
        .is_err()
    {
        let _ = write_response(
            &mut stream,
            Response::error(id, "shutting_down", "daemon is shutting down"),
        );
        return;
    }

    let response = reply_rx
        .recv_timeout(Duration::from_secs(REPLY_TIMEOUT_SECS))
        .unwrap_or_else(|_| Response::error(id, "timeout", "daemon did not reply in time"));
    let stop = is_shutdown && response.ok;
    let _ = write_response(&mut stream, response);
    if stop {
        let _ = events.send(LoopEvent::Stop);
    }
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    let request_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
