use axum::{
  Router,
  body::{Body, Bytes},
  extract::{DefaultBodyLimit, Json, State, rejection::JsonRejection},
  http::{HeaderName, HeaderValue, Method, header},
  response::{IntoResponse, Response},
  routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use crate::{
  config::GatewayConfig,
  error::GatewayError,
  modules::ContentFilter,
  providers::{ChatOptions, Content, ProviderFactory, StreamUsage, SystemInstruction},
};

/// Request bodies may carry inline images
const BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;
/// Chunks buffered between the adapter task and the response body
const STREAM_BUFFER: usize = 32;

#[derive(Clone)]
pub struct AppState {
  config: Arc<GatewayConfig>,
  factory: ProviderFactory,
}

impl AppState {
  pub fn new(config: GatewayConfig, factory: ProviderFactory) -> Self {
    Self {
      config: Arc::new(config),
      factory,
    }
  }

  /// Wire the filter, HTTP client, and adapters described by `config`
  pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayError> {
    let filter = match config.sensitive_words_path.as_deref() {
      Some(path) => ContentFilter::load(path)?,
      None => ContentFilter::default(),
    };
    if filter.is_empty() {
      warn!("sensitive-content filter has no entries; Gemini requests go unchecked");
    }

    let http = reqwest::Client::builder().build()?;
    let factory = ProviderFactory::from_parts(http, &config.gemini_endpoint, Arc::new(filter));
    Ok(Self::new(config, factory))
  }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
  contents: Vec<Content>,
  #[serde(default)]
  options: Option<ChatRequestOptions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequestOptions {
  system_instruction: Option<SystemInstruction>,
  temperature: Option<f64>,
  json_mode: Option<bool>,
  enable_search: Option<bool>,
}

pub fn router(state: AppState) -> Router {
  let cors = cors_layer(&state.config.allowed_origins);

  Router::new()
    .route("/health", get(health))
    .route("/ai/chat", post(chat))
    .with_state(state)
    .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
    .layer(cors)
    .layer(TraceLayer::new_for_http())
}

pub async fn serve(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  let host = config.host.clone();
  let port = config.port;
  let provider = if config.provider.is_empty() { "gemini" } else { config.provider.as_str() };
  info!(provider, model = %config.model, key_configured = config.api_key.is_some(), "gateway configuration loaded");

  let app = router(AppState::from_config(config)?);
  let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;

  info!("🚀 LLM gateway running on http://{}", listener.local_addr()?);
  info!("📡 Chat endpoint: POST /ai/chat");

  axum::serve(listener, app).await?;
  Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
  let methods = [
    Method::GET,
    Method::HEAD,
    Method::PUT,
    Method::PATCH,
    Method::POST,
    Method::DELETE,
    Method::OPTIONS,
  ];
  let headers = [
    header::CONTENT_TYPE,
    header::ACCEPT,
    header::AUTHORIZATION,
    HeaderName::from_static("x-requested-with"),
  ];

  if allowed_origins.is_empty() {
    CorsLayer::new()
      .allow_origin(Any)
      .allow_methods(methods)
      .allow_headers(headers)
  } else {
    let origins = allowed_origins
      .iter()
      .filter_map(|origin| HeaderValue::from_str(origin).ok())
      .collect::<Vec<_>>();
    CorsLayer::new()
      .allow_origin(origins)
      .allow_methods(methods)
      .allow_headers(headers)
  }
}

async fn health() -> impl IntoResponse {
  Json(json!({ "status": "ok" }))
}

async fn chat(
  State(state): State<AppState>,
  payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
  // No key, no upstream call
  let Some(api_key) = state.config.api_key.clone() else {
    return GatewayError::MissingApiKey.into_response();
  };

  let ChatRequest { contents, options } = match payload {
    Ok(Json(request)) => request,
    Err(rejection) => return GatewayError::bad_request(rejection.body_text()).into_response(),
  };
  let options = options.unwrap_or_default();

  let resolved = match state.factory.resolve(&state.config.provider) {
    Ok(resolved) => resolved,
    Err(err) => {
      error!("[Chat Error] {err}");
      return err.into_response();
    }
  };
  debug!(?resolved, "provider resolved");

  let chat_options = ChatOptions {
    model: state.config.model.clone(),
    system_instruction: options.system_instruction,
    temperature: options.temperature,
    json_mode: options.json_mode.unwrap_or(false),
    enable_search: options.enable_search.unwrap_or(false),
    api_key: Some(api_key),
    base_url: resolved.base_url,
  };

  let (tx, mut rx) = mpsc::channel::<Bytes>(STREAM_BUFFER);
  let adapter = resolved.adapter;
  let task = tokio::spawn(async move {
    let mut sink = tx;
    adapter.chat_stream(&mut sink, &contents, &chat_options).await
  });

  // Nothing is committed until the first chunk arrives, so earlier failures still become JSON
  let first = match rx.recv().await {
    Some(chunk) => chunk,
    None => {
      return match finish_stream(task).await {
        Ok(_) => event_stream_response(Body::empty()),
        Err(err) => {
          error!("[Chat Error] {err}");
          err.into_response()
        }
      };
    }
  };

  let body = async_stream::stream! {
    yield Ok::<Bytes, std::io::Error>(first);
    while let Some(chunk) = rx.recv().await {
      yield Ok(chunk);
    }
    // Headers are gone; an errored body is the only way left to signal failure
    if let Err(err) = finish_stream(task).await {
      error!("[Chat Error] stream aborted: {err}");
      yield Err(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()));
    }
  };

  event_stream_response(Body::from_stream(body))
}

async fn finish_stream(
  task: JoinHandle<Result<StreamUsage, GatewayError>>,
) -> Result<StreamUsage, GatewayError> {
  let usage = task
    .await
    .map_err(|err| GatewayError::upstream(format!("chat task failed: {err}")))??;
  info!(
    input_tokens = usage.input_tokens,
    output_tokens = usage.output_tokens,
    "chat stream completed"
  );
  Ok(usage)
}

fn event_stream_response(body: Body) -> Response {
  let mut response = Response::new(body);
  let headers = response.headers_mut();
  headers.insert(
    header::CONTENT_TYPE,
    HeaderValue::from_static("text/event-stream; charset=utf-8"),
  );
  headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
  headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
  // Keeps nginx from buffering the stream
  headers.insert(
    HeaderName::from_static("x-accel-buffering"),
    HeaderValue::from_static("no"),
  );
  response
}
