//! OpenAI Compatible Provider Adapter
//! Handles OpenAI and every vendor exposing an OpenAI-style chat completions API

use super::base::{ensure_success, join_url, require_api_key, sse_data, CallError};
use super::traits::{
    ChatOptions, ChatSink, Content, ImageOptions, ProviderAdapter, StreamUsage, SystemInstruction,
    TokenCount,
};
use crate::error::GatewayError;
use crate::providers::constants::{get_base_url, DEFAULT_IMAGE_SIZE, DEFAULT_TEMPERATURE};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

const MISSING_KEY_MESSAGE: &str = "API Key is required";
const INVALID_KEY_MESSAGE: &str = "Invalid API Key for this provider.";
const DONE_MARKER: &str = "[DONE]";

/// Adapter for any OpenAI-compatible endpoint; the base URL comes with each call
pub struct OpenAICompatibleAdapter {
    http: reqwest::Client,
}

impl OpenAICompatibleAdapter {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn stream_completion(
        &self,
        sink: &mut dyn ChatSink,
        base_url: &str,
        contents: &[Content],
        options: &ChatOptions,
    ) -> Result<StreamUsage, CallError> {
        let api_key = require_api_key(options.api_key.as_deref(), MISSING_KEY_MESSAGE)?;

        let mut request_body = json!({
            "model": options.model,
            "messages": to_openai_messages(contents, options.system_instruction.as_ref()),
            "stream": true,
            "temperature": options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        });
        if options.json_mode {
            request_body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(join_url(base_url, "chat/completions"))
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let mut usage = StreamUsage::default();
        let mut events = Box::pin(sse_data(response));
        while let Some(data) = events.next().await {
            let data = data?;
            if data.trim() == DONE_MARKER {
                break;
            }

            let chunk: CompletionChunk = serde_json::from_str(&data)
                .map_err(|err| CallError::vendor(format!("malformed stream chunk: {err}")))?;
            if let Some(err) = chunk.error {
                return Err(CallError::vendor(vendor_error_text(&err)));
            }

            let content = chunk
                .choices
                .first()
                .and_then(|choice| choice.delta.as_ref())
                .and_then(|delta| delta.content.as_deref())
                .unwrap_or("");
            if !content.is_empty() {
                sink.write(content).await?;
            }

            // Some vendors only attach usage to the final chunk
            if let Some(chunk_usage) = chunk.usage {
                usage.input_tokens = chunk_usage.prompt_tokens;
                usage.output_tokens = chunk_usage.completion_tokens;
            }
        }

        Ok(usage)
    }

    async fn request_image(&self, base_url: &str, options: &ImageOptions) -> Result<Value, CallError> {
        let api_key = require_api_key(options.api_key.as_deref(), MISSING_KEY_MESSAGE)?;

        let response = self
            .http
            .post(join_url(base_url, "images/generations"))
            .bearer_auth(api_key)
            .json(&json!({
                "model": options.model,
                "prompt": options.prompt,
                "size": options.resolution.as_deref().unwrap_or(DEFAULT_IMAGE_SIZE),
                "n": 1,
            }))
            .send()
            .await?;
        let payload: Value = ensure_success(response).await?.json().await?;

        Ok(json!({ "candidates": payload.get("data").cloned().unwrap_or(Value::Null) }))
    }

    fn map_error(err: CallError, base_url: &str) -> GatewayError {
        match err {
            CallError::Gateway(err) => err,
            CallError::Vendor {
                status: Some(StatusCode::UNAUTHORIZED),
                ..
            } => GatewayError::bad_request(INVALID_KEY_MESSAGE),
            CallError::Vendor { message, .. } => {
                error!("[OpenAI Compatible] Error ({base_url}): {message}");
                GatewayError::upstream(format!("{message} ({base_url})"))
            }
        }
    }
}

/// No base URL means the official OpenAI endpoint
fn resolve_base_url(base_url: Option<&str>) -> &str {
    base_url
        .filter(|url| !url.trim().is_empty())
        .or_else(|| get_base_url("openai"))
        .unwrap_or_default()
}

#[async_trait]
impl ProviderAdapter for OpenAICompatibleAdapter {
    fn provider_name(&self) -> &str {
        "openai_compatible"
    }

    async fn chat_stream(
        &self,
        sink: &mut dyn ChatSink,
        contents: &[Content],
        options: &ChatOptions,
    ) -> Result<StreamUsage, GatewayError> {
        let base_url = resolve_base_url(options.base_url.as_deref());
        self.stream_completion(sink, base_url, contents, options)
            .await
            .map_err(|err| Self::map_error(err, base_url))
    }

    async fn generate_image(&self, options: &ImageOptions) -> Result<Value, GatewayError> {
        let base_url = resolve_base_url(options.base_url.as_deref());
        self.request_image(base_url, options).await.map_err(|err| match err {
            CallError::Gateway(err) => err,
            CallError::Vendor { message, .. } => {
                GatewayError::upstream(format!("Image generation failed: {message}"))
            }
        })
    }

    async fn count_tokens(&self, _contents: &[Content], _options: &ChatOptions) -> TokenCount {
        // No local tokenizer; callers get zero
        TokenCount::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Convert turns to role/content messages; empty turns are dropped
fn to_openai_messages(contents: &[Content], system: Option<&SystemInstruction>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(contents.len() + 1);

    if let Some(system) = system {
        let text = system.plain_text();
        if !text.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: text,
            });
        }
    }

    for item in contents {
        let content = item.joined_text();
        if content.is_empty() {
            continue;
        }
        let role = item.role.map(|role| role.openai_name()).unwrap_or("user");
        messages.push(ChatMessage { role, content });
    }
    messages
}

fn vendor_error_text(err: &Value) -> String {
    err.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<ChunkUsage>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
