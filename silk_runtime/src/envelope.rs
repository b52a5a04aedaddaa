use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One call from the webview, decoded from an `"invoke"` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    pub callback: i64,
    pub cmd: String,
    pub args: Value,
}

/// Decode failures, one kind per malformed field. Envelopes that fail to
/// decode carry no trustworthy callback, so they are logged and dropped
/// rather than answered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope is not a JSON object")]
    InvalidEnvelope,
    #[error("envelope has no 'kind' field")]
    MissingKind,
    #[error("envelope 'kind' is not a string")]
    InvalidKind,
    #[error("unsupported envelope kind '{0}'")]
    UnsupportedKind(String),
    #[error("envelope has no 'callback' field")]
    MissingCallback,
    #[error("envelope 'callback' is not a non-negative integer")]
    InvalidCallback,
    #[error("envelope has no 'cmd' field")]
    MissingCommand,
    #[error("envelope 'cmd' is not a non-empty string")]
    InvalidCommand,
}

pub fn parse_invoke(raw: &str) -> Result<InvokeRequest, EnvelopeError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| EnvelopeError::InvalidEnvelope)?;
    let object = value.as_object().ok_or(EnvelopeError::InvalidEnvelope)?;

    let kind = object.get("kind").ok_or(EnvelopeError::MissingKind)?;
    let kind = kind.as_str().ok_or(EnvelopeError::InvalidKind)?;
    if kind != "invoke" {
        return Err(EnvelopeError::UnsupportedKind(kind.to_string()));
    }

    let callback = object.get("callback").ok_or(EnvelopeError::MissingCallback)?;
    let callback = parse_callback(callback)?;

    let cmd = object.get("cmd").ok_or(EnvelopeError::MissingCommand)?;
    let cmd = cmd.as_str().ok_or(EnvelopeError::InvalidCommand)?;
    if cmd.is_empty() {
        return Err(EnvelopeError::InvalidCommand);
    }

    let args = object.get("args").cloned().unwrap_or(Value::Null);

    Ok(InvokeRequest {
        callback,
        cmd: cmd.to_string(),
        args,
    })
}

// A float with zero fractional part is coerced; JS callers count in doubles.
fn parse_callback(value: &Value) -> Result<i64, EnvelopeError> {
    if let Some(n) = value.as_i64() {
        if n >= 0 {
            return Ok(n);
        }
        return Err(EnvelopeError::InvalidCallback);
    }

    if let Some(f) = value.as_f64() {
        if f >= 0.0 && f.fract() == 0.0 && f <= i64::MAX as f64 {
            return Ok(f as i64);
        }
    }

    Err(EnvelopeError::InvalidCallback)
}

/// Serialize an invoke envelope as a single JSON line for the external
/// handler child process.
pub fn serialize_invoke(request: &InvokeRequest) -> String {
    serde_json::json!({
        "kind": "invoke",
        "callback": request.callback,
        "cmd": request.cmd,
        "args": request.args,
    })
    .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseError {
    pub code: String,
    pub message: String,
}

/// One outcome, serialized back to the webview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub kind: String,
    pub callback: i64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn success(callback: i64, result: Value) -> Self {
        Self {
            kind: "response".to_string(),
            callback,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(callback: i64, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: "response".to_string(),
            callback,
            ok: false,
            result: None,
            error: Some(ResponseError {
                code: code.as_str().to_string(),
                message: message.into(),
            }),
        }
    }

    /// Wrap the response in the script the host evaluates in the webview.
    /// The `window.__silk && window.__silk.__dispatch(...)` prefix is part
    /// of the external interface; the bridge script installs the callee.
    pub fn to_script(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| {
            // Value trees never fail to serialize; keep the callback alive anyway.
            format!(
                "{{\"kind\":\"response\",\"callback\":{},\"ok\":false,\"error\":{{\"code\":\"INTERNAL_ERROR\",\"message\":\"response serialization failed\"}}}}",
                self.callback
            )
        });
        format!("window.__silk && window.__silk.__dispatch({json});")
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
