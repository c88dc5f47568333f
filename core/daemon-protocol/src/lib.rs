//! IPC protocol types and validation for fuzzyfind-daemon.
//!
//! This crate is shared by the daemon and the `fuzzyfind` CLI to prevent
//! schema drift. The daemon remains the authority on validation, but clients
//! can reuse the same types to construct valid requests.
//!
//! Framing: one JSON `Request` per connection, terminated by a newline; one
//! JSON `Response` back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

const MAX_MODE_NAME_LEN: usize = 128;
const MAX_RECORD_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetStatus,
    Present,
    Select,
    ForceFullIndex,
    CreateIndex,
    ReloadConfig,
    Shutdown,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: None,
            params,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// `present`: select a mode and show the session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresentParams {
    pub mode: String,
    /// Absolute workspace root. Defaults to the daemon's workspace.
    #[serde(default)]
    pub workspace: Option<String>,
    /// Active document, workspace-relative or absolute.
    #[serde(default)]
    pub active_file: Option<String>,
}

impl PresentParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_string(&self.mode, "mode")?;
        if self.mode.len() > MAX_MODE_NAME_LEN {
            return Err(ErrorInfo::new(
                "invalid_params",
                format!("mode must be {} characters or fewer", MAX_MODE_NAME_LEN),
            ));
        }
        if let Some(workspace) = &self.workspace {
            require_absolute(workspace, "workspace")?;
        }
        Ok(())
    }
}

/// `select`: the record the filter's selection binding emitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SelectParams {
    pub record: String,
    #[serde(default)]
    pub workspace: Option<String>,
}

impl SelectParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_string(&self.record, "record")?;
        if self.record.len() > MAX_RECORD_LEN {
            return Err(ErrorInfo::new("invalid_params", "record is too long"));
        }
        if let Some(workspace) = &self.workspace {
            require_absolute(workspace, "workspace")?;
        }
        Ok(())
    }
}

pub fn parse_present(params: Option<Value>) -> Result<PresentParams, ErrorInfo> {
    let params: PresentParams = parse_params(params, "present")?;
    params.validate()?;
    Ok(params)
}

pub fn parse_select(params: Option<Value>) -> Result<SelectParams, ErrorInfo> {
    let params: SelectParams = parse_params(params, "select")?;
    params.validate()?;
    Ok(params)
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
    method: &str,
) -> Result<T, ErrorInfo> {
    let params = params.ok_or_else(|| {
        ErrorInfo::new("invalid_params", format!("{} requires params", method))
    })?;
    serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("{} params are invalid: {}", method, err),
        )
    })
}

fn require_string(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if !value.trim().is_empty() {
        return Ok(());
    }
    Err(ErrorInfo::new(
        "missing_field",
        format!("{} is required", field),
    ))
}

fn require_absolute(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if std::path::Path::new(value).is_absolute() {
        Ok(())
    } else {
        Err(ErrorInfo::new(
            "invalid_params",
            format!("{} must be an absolute path", field),
        ))
    }
}
