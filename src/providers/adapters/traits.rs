//! Provider Adapter Traits
//! Defines the interface for all provider adapters and the request shapes they share

use crate::error::GatewayError;
use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Assistant,
    System,
    /// Any other role (`tool`, `function`, ...) is sent as a user turn
    #[serde(other)]
    Other,
}

impl Role {
    /// Role name on OpenAI-style chat completions
    pub fn openai_name(self) -> &'static str {
        match self {
            Role::User | Role::Other => "user",
            Role::Model | Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Role name on Gemini `contents`, which only knows `user` and `model`
    pub fn gemini_name(self) -> &'static str {
        match self {
            Role::Model | Role::Assistant => "model",
            Role::User | Role::System | Role::Other => "user",
        }
    }
}

/// One part of a turn. Anything besides `text` (inline data, file refs) rides along untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            extra: Map::new(),
        }
    }
}

/// One conversation turn, Gemini-shaped (`parts`) or OpenAI-shaped (`content`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Content {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part::text(text)],
            content: None,
        }
    }

    /// Text of the turn: parts joined by newlines, or the direct content string
    pub fn joined_text(&self) -> String {
        if !self.parts.is_empty() {
            return self
                .parts
                .iter()
                .map(|part| part.text.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join("\n");
        }
        self.content.clone().unwrap_or_default()
    }

    /// Gemini wire shape; a bare `content` string becomes a single text part
    pub fn to_gemini(&self) -> Value {
        let parts = if self.parts.is_empty() {
            match self.content.as_deref() {
                Some(text) => vec![Part::text(text)],
                None => Vec::new(),
            }
        } else {
            self.parts.clone()
        };

        let mut value = json!({ "parts": parts });
        if let Some(role) = self.role {
            value["role"] = json!(role.gemini_name());
        }
        value
    }
}

/// System prompt, either a plain string or a full content object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemInstruction {
    Text(String),
    Content(Content),
}

impl SystemInstruction {
    pub fn plain_text(&self) -> String {
        match self {
            SystemInstruction::Text(text) => text.clone(),
            SystemInstruction::Content(content) => content.joined_text(),
        }
    }

    pub fn to_gemini(&self) -> Value {
        match self {
            SystemInstruction::Text(text) => json!({ "parts": [{ "text": text }] }),
            SystemInstruction::Content(content) => content.to_gemini(),
        }
    }
}

impl From<&str> for SystemInstruction {
    fn from(text: &str) -> Self {
        SystemInstruction::Text(text.to_string())
    }
}

/// Options for a streaming chat call
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: String,
    pub system_instruction: Option<SystemInstruction>,
    pub temperature: Option<f64>,
    pub json_mode: bool,
    pub enable_search: bool,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Options for a one-shot image generation call
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub model: Option<String>,
    pub prompt: String,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Token usage reported by a finished stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCount {
    pub total_tokens: u64,
}

/// Write side of a chat stream. Adapters call `write` once per chunk, in arrival order.
#[async_trait]
pub trait ChatSink: Send {
    async fn write(&mut self, chunk: &str) -> Result<(), GatewayError>;
}

#[async_trait]
impl ChatSink for mpsc::Sender<Bytes> {
    async fn write(&mut self, chunk: &str) -> Result<(), GatewayError> {
        self.send(Bytes::copy_from_slice(chunk.as_bytes()))
            .await
            .map_err(|_| GatewayError::SinkClosed)
    }
}

#[cfg(test)]
#[async_trait]
impl ChatSink for Vec<String> {
    async fn write(&mut self, chunk: &str) -> Result<(), GatewayError> {
        self.push(chunk.to_string());
        Ok(())
    }
}

/// Provider adapter trait
/// All provider adapters must implement this trait
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Get provider name
    fn provider_name(&self) -> &str;

    /// Stream generated text into `sink`, returning the last usage the vendor reported
    async fn chat_stream(
        &self,
        sink: &mut dyn ChatSink,
        contents: &[Content],
        options: &ChatOptions,
    ) -> Result<StreamUsage, GatewayError>;

    /// Generate an image and hand back the vendor payload as-is
    async fn generate_image(&self, options: &ImageOptions) -> Result<Value, GatewayError>;

    /// Best-effort token count; failures come back as zero
    async fn count_tokens(&self, contents: &[Content], options: &ChatOptions) -> TokenCount;
}
