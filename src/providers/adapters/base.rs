//! Base Provider Adapter
//! HTTP plumbing shared by the vendor adapters

use crate::error::GatewayError;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;

/// Failure inside an adapter call, before it is mapped to the adapter's error policy
#[derive(Debug)]
pub(super) enum CallError {
    /// Already classified (missing key, blocked content, closed sink)
    Gateway(GatewayError),
    /// Raised by the vendor or the transport
    Vendor {
        status: Option<StatusCode>,
        message: String,
    },
}

impl CallError {
    pub(super) fn vendor(message: impl Into<String>) -> Self {
        CallError::Vendor {
            status: None,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for CallError {
    fn from(err: GatewayError) -> Self {
        CallError::Gateway(err)
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        CallError::Vendor {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// Return the key, or a client error when it is absent or blank
pub(super) fn require_api_key<'a>(
    api_key: Option<&'a str>,
    message: &str,
) -> Result<&'a str, GatewayError> {
    match api_key {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(GatewayError::bad_request(message)),
    }
}

pub(super) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Pass 2xx responses through; turn anything else into a vendor error carrying its message
pub(super) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CallError::Vendor {
        status: Some(status),
        message: vendor_message(status, &body),
    })
}

/// Pull a readable message out of a vendor error body
fn vendor_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        value
            .get("error")
            .and_then(|error| error.get("message").or(Some(error)))
            .or_else(|| value.get("message"))
            .and_then(|message| message.as_str())
            .map(str::to_string)
    });

    match message {
        Some(message) => format!("{status}: {message}"),
        None if body.trim().is_empty() => status.to_string(),
        None => format!("{status}: {}", body.trim()),
    }
}

/// `data:` payloads of a server-sent event response, in arrival order
pub(super) fn sse_data(response: reqwest::Response) -> impl Stream<Item = Result<String, CallError>> + Send {
    response.bytes_stream().eventsource().filter_map(|event| async move {
        match event {
            Ok(event) if event.data.trim().is_empty() => None,
            Ok(event) => Some(Ok(event.data)),
            Err(err) => Some(Err(CallError::vendor(format!("stream interrupted: {err}")))),
        }
    })
}
