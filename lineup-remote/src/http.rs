//! Plumbing shared by the HTTP backends.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A failed call, before each backend maps it to its own error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Failure {
    /// The server answered with a non-2xx status.
    Status { status: u16, body: String },
    /// Connection, TLS, timeout or body read failure.
    Transport(String),
}

impl From<ureq::Error> for Failure {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => Failure::Status {
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => Failure::Transport(t.to_string()),
        }
    }
}

/// Human-readable message from a JSON error body (`message`, `error` or
/// `msg`), falling back to the raw body.
pub(crate) fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["message", "error", "msg"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Decode a JSON body, reporting failures as text.
pub(crate) fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T, String> {
    let body = response.into_string().map_err(|e| e.to_string())?;
    serde_json::from_str(&body).map_err(|e| format!("{e}: {body}"))
}

/// Strip trailing slashes so paths can be appended with `/`.
pub(crate) fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
