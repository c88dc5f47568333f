//! Client helper for talking to the fuzzyfind daemon.
//!
//! One request per connection. A request is retried once, with the same id,
//! only when it never reached the daemon (connect or write failed). Once it is
//! written it is never sent twice: a timeout or dropped reply may follow a
//! request the daemon already acted on.

use fuzzyfind_core::StorageConfig;
use fuzzyfind_daemon_protocol::{ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES};
use serde_json::Value;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// The daemon waits up to 30s on its own loop; leave room for the reply.
const READ_TIMEOUT_MS: u64 = 35_000;
const WRITE_TIMEOUT_MS: u64 = 600;
const RETRY_DELAY_MS: u64 = 50;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Transport(String),

    #[error("{}: {}", .0.code, .0.message)]
    Daemon(ErrorInfo),
}

/// Where a send attempt failed.
#[derive(Debug)]
enum SendError {
    /// The daemon never saw the request.
    NotSent(String),
    /// The request was written; the reply is missing or unreadable.
    NoReply(String),
}

impl SendError {
    fn into_message(self) -> String {
        match self {
            SendError::NotSent(msg) | SendError::NoReply(msg) => msg,
        }
    }
}

pub fn socket_path() -> Result<PathBuf, ClientError> {
    StorageConfig::from_home()
        .map(|storage| storage.socket_file())
        .map_err(|err| ClientError::Transport(err.to_string()))
}

/// Sends `method` and returns the response payload.
pub fn call(method: Method, params: Option<Value>) -> Result<Value, ClientError> {
    let socket = socket_path()?;
    call_at(&socket, method, params)
}

pub fn call_at(socket: &Path, method: Method, params: Option<Value>) -> Result<Value, ClientError> {
    let mut request = Request::new(method, params);
    request.id = Some(make_request_id());

    let response = match send_request(socket, &request) {
        Ok(response) => response,
        Err(SendError::NotSent(err)) => {
            tracing::warn!(error = %err, method = ?method, "Failed to reach daemon");
            std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
            send_request(socket, &request).map_err(|retry_err| {
                let retry_err = retry_err.into_message();
                tracing::warn!(error = %retry_err, method = ?method, "Retry failed reaching daemon");
                ClientError::Transport(retry_err)
            })?
        }
        Err(SendError::NoReply(err)) => {
            tracing::warn!(error = %err, method = ?method, "Daemon did not reply");
            return Err(ClientError::Transport(err));
        }
    };

    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        let error = response
            .error
            .unwrap_or_else(|| ErrorInfo::new("unknown_error", "Unknown daemon error"));
        Err(ClientError::Daemon(error))
    }
}

fn send_request(socket: &Path, request: &Request) -> Result<Response, SendError> {
    let mut stream = UnixStream::connect(socket).map_err(|err| {
        SendError::NotSent(format!("Failed to connect to daemon socket: {}", err))
    })?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    // The daemon only acts on a newline-terminated line, so a partial write
    // is still unsent.
    serde_json::to_writer(&mut stream, request)
        .map_err(|err| SendError::NotSent(format!("Failed to write request: {}", err)))?;
    stream
        .write_all(b"\n")
        .map_err(|err| SendError::NotSent(format!("Failed to flush request: {}", err)))?;
    stream.flush().ok();

    read_response(&mut stream).map_err(SendError::NoReply)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("Response exceeded maximum size".to_string());
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
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

fn make_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("cli-{}-{}", std::process::id(), millis)
}
