//! Gateway error type
//! Every failure a request can hit, plus its HTTP rendering

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No API key configured for this deployment
    #[error("API Key is missing in server configuration.")]
    MissingApiKey,

    /// Caller-side problem: unknown provider, blocked content, bad body, rejected key
    #[error("{0}")]
    BadRequest(String),

    /// Vendor or network failure
    #[error("{0}")]
    Upstream(String),

    /// The receiving end of a chat stream went away
    #[error("stream consumer disconnected")]
    SinkClosed,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl GatewayError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingApiKey => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::SinkClosed | Self::Config(_) | Self::Io(_) | Self::Http(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client errors pass through adapters untouched; everything else gets wrapped
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.to_string() {
            message if message.is_empty() => "Internal Server Error".to_string(),
            message => message,
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_error_kind() {
        assert_eq!(GatewayError::MissingApiKey.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GatewayError::bad_request("Unknown provider: foo").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::upstream("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(!GatewayError::SinkClosed.is_client_error());
    }

    #[tokio::test]
    async fn renders_json_error_body() {
        let response = GatewayError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "nope");
    }
}
