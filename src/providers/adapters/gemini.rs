//! Gemini Provider Adapter
//! Talks to Google's Generative Language REST API directly

use super::base::{ensure_success, join_url, require_api_key, sse_data, CallError};
use super::traits::{
    ChatOptions, ChatSink, Content, ImageOptions, ProviderAdapter, Role, StreamUsage,
    SystemInstruction, TokenCount,
};
use crate::error::GatewayError;
use crate::modules::ContentFilter;
use crate::providers::constants::{DEFAULT_GEMINI_IMAGE_MODEL, DEFAULT_TEMPERATURE};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

const MISSING_KEY_MESSAGE: &str = "Google API Key is required for this provider.";

pub struct GeminiAdapter {
    http: reqwest::Client,
    endpoint: String,
    filter: Arc<ContentFilter>,
}

impl GeminiAdapter {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, filter: Arc<ContentFilter>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            filter,
        }
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        join_url(&self.endpoint, &format!("models/{model}:{method}"))
    }

    /// Checks the turns in their outbound shape, so bare `content` strings are covered too
    fn check_sensitive(&self, contents: &[Content], options: &ChatOptions) -> Result<(), GatewayError> {
        let outbound = contents.iter().map(Content::to_gemini).collect::<Vec<_>>();
        self.filter.check_value(&Value::Array(outbound))?;
        if let Some(system) = options.system_instruction.as_ref() {
            self.filter.check_value(&system.to_gemini())?;
        }
        Ok(())
    }

    async fn stream_generate(
        &self,
        sink: &mut dyn ChatSink,
        contents: &[Content],
        options: &ChatOptions,
    ) -> Result<StreamUsage, CallError> {
        self.check_sensitive(contents, options)?;
        let api_key = require_api_key(options.api_key.as_deref(), MISSING_KEY_MESSAGE)?;

        let response = self
            .http
            .post(format!("{}?alt=sse", self.model_url(&options.model, "streamGenerateContent")))
            .header("x-goog-api-key", api_key)
            .json(&build_generate_request(contents, options))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let mut usage = StreamUsage::default();
        let mut events = Box::pin(sse_data(response));
        while let Some(data) = events.next().await {
            let chunk: GenerateContentChunk = serde_json::from_str(&data?)
                .map_err(|err| CallError::vendor(format!("malformed stream chunk: {err}")))?;

            if let Some(metadata) = chunk.usage_metadata.as_ref() {
                usage.input_tokens = metadata.prompt_token_count;
                usage.output_tokens = metadata.candidates_token_count;
            }

            let text = chunk.text();
            if !text.is_empty() {
                sink.write(&text).await?;
            }
        }

        Ok(usage)
    }

    async fn request_image(&self, options: &ImageOptions) -> Result<Value, CallError> {
        self.filter.check(&options.prompt)?;
        let api_key = require_api_key(options.api_key.as_deref(), MISSING_KEY_MESSAGE)?;

        let mut image_config = json!({});
        if let Some(aspect_ratio) = options.aspect_ratio.as_deref() {
            image_config["aspectRatio"] = json!(aspect_ratio);
        }
        if let Some(size) = options.resolution.as_deref().map(image_size) {
            image_config["imageSize"] = json!(size);
        }

        let model = options
            .model
            .as_deref()
            .filter(|model| !model.is_empty())
            .unwrap_or(DEFAULT_GEMINI_IMAGE_MODEL);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": options.prompt }] }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": image_config,
            },
        });

        let response = self
            .http
            .post(self.model_url(model, "generateContent"))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let payload: Value = ensure_success(response).await?.json().await?;

        Ok(json!({
            "candidates": payload.get("candidates").cloned().unwrap_or(Value::Null),
            "usageMetadata": payload.get("usageMetadata").cloned().unwrap_or(Value::Null),
        }))
    }

    async fn request_token_count(&self, contents: &[Content], options: &ChatOptions) -> Result<u64, CallError> {
        let api_key = require_api_key(options.api_key.as_deref(), MISSING_KEY_MESSAGE)?;

        let mut turns = Vec::with_capacity(contents.len() + 1);
        if let Some(system) = options.system_instruction.as_ref() {
            let system_text = match system {
                SystemInstruction::Text(text) => text.clone(),
                SystemInstruction::Content(content) => serde_json::to_string(content)
                    .map_err(|err| CallError::vendor(err.to_string()))?,
            };
            turns.push(Content::new(Role::User, format!("System Instruction: {system_text}")).to_gemini());
        }
        turns.extend(contents.iter().map(Content::to_gemini));

        let response = self
            .http
            .post(self.model_url(&options.model, "countTokens"))
            .header("x-goog-api-key", api_key)
            .json(&json!({ "contents": turns }))
            .send()
            .await?;
        let counted: CountTokensResponse = ensure_success(response).await?.json().await?;
        Ok(counted.total_tokens)
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    async fn chat_stream(
        &self,
        sink: &mut dyn ChatSink,
        contents: &[Content],
        options: &ChatOptions,
    ) -> Result<StreamUsage, GatewayError> {
        self.stream_generate(sink, contents, options)
            .await
            .map_err(|err| match err {
                CallError::Gateway(err) => err,
                CallError::Vendor { message, .. } => {
                    error!("[Gemini] chat error: {message}");
                    GatewayError::upstream(format!("Google AI Error: {message}"))
                }
            })
    }

    async fn generate_image(&self, options: &ImageOptions) -> Result<Value, GatewayError> {
        self.request_image(options).await.map_err(|err| match err {
            CallError::Gateway(err) => err,
            CallError::Vendor { message, .. } => {
                GatewayError::upstream(format!("Image Gen Error: {message}"))
            }
        })
    }

    async fn count_tokens(&self, contents: &[Content], options: &ChatOptions) -> TokenCount {
        match self.request_token_count(contents, options).await {
            Ok(total_tokens) => TokenCount { total_tokens },
            Err(err) => {
                debug!("[Gemini] token count unavailable: {err:?}");
                TokenCount::default()
            }
        }
    }
}

/// Request body for `streamGenerateContent`
fn build_generate_request(contents: &[Content], options: &ChatOptions) -> Value {
    let response_mime_type = if options.json_mode {
        "application/json"
    } else {
        "text/plain"
    };

    let mut body = json!({
        "contents": contents.iter().map(Content::to_gemini).collect::<Vec<_>>(),
        "generationConfig": {
            "responseMimeType": response_mime_type,
            "temperature": options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        },
    });
    if options.enable_search {
        body["tools"] = json!([{ "googleSearch": {} }]);
    }
    if let Some(system) = options.system_instruction.as_ref() {
        body["systemInstruction"] = system.to_gemini();
    }
    body
}

/// `1K`/`2K` shorthands expand to square sizes; anything else passes through
fn image_size(resolution: &str) -> String {
    match resolution {
        "1K" => "1024x1024".to_string(),
        "2K" => "2048x2048".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentChunk {
    /// Text increment of the first candidate, skipping thought parts
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    #[serde(default)]
    total_tokens: u64,
}
