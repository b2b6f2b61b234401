use axum::{
  body::{to_bytes, Body},
  http::{header, Request, StatusCode},
  Router,
};
use llm_gateway::{
  modules::ContentFilter,
  providers::ProviderFactory,
  server::{router, AppState},
  GatewayConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(server: &MockServer, provider: &str, api_key: Option<&str>) -> Router {
  let config = GatewayConfig {
    provider: provider.to_string(),
    api_key: api_key.map(str::to_string),
    model: "test-model".to_string(),
    gemini_endpoint: server.uri(),
    ..Default::default()
  };
  let filter = ContentFilter::from_lines(["forbidden"]).unwrap();
  let factory = ProviderFactory::from_parts(reqwest::Client::new(), &server.uri(), Arc::new(filter));
  router(AppState::new(config, factory))
}

fn chat_request(body: Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri("/ai/chat")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap()
}

fn hello() -> Value {
  json!({ "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }] })
}

fn openai_sse(deltas: &[&str]) -> String {
  let mut body: String = deltas
    .iter()
    .map(|text| format!("data: {}\n\n", json!({ "choices": [{ "index": 0, "delta": { "content": text } }] })))
    .collect();
  body.push_str("data: [DONE]\n\n");
  body
}

async fn json_body(response: axum::response::Response) -> Value {
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_key_is_rejected_before_any_upstream_call() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(200))
    .expect(0)
    .mount(&server)
    .await;

  let response = app(&server, &server.uri(), None)
    .oneshot(chat_request(hello()))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
  let body = json_body(response).await;
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn streams_compatible_provider_output_as_plain_text() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/chat/completions"))
    .respond_with(ResponseTemplate::new(200).set_body_raw(openai_sse(&["a", "b", "c"]), "text/event-stream"))
    .expect(1)
    .mount(&server)
    .await;

  let request = json!({
    "contents": [
      { "role": "user", "parts": [{ "text": "hi" }] },
      { "role": "model", "parts": [{ "text": "hello" }] },
      { "role": "user", "parts": [{ "text": "count" }] }
    ],
    "options": { "systemInstruction": "Be brief", "temperature": 0.1 }
  });
  let response = app(&server, &server.uri(), Some("sk-test"))
    .oneshot(chat_request(request))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::OK);
  let headers = response.headers();
  assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream; charset=utf-8");
  assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
  assert_eq!(headers["x-accel-buffering"], "no");

  let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  assert_eq!(&body[..], b"abc");

  let sent: Value = server.received_requests().await.unwrap()[0].body_json().unwrap();
  assert_eq!(sent["model"], "test-model");
  assert_eq!(sent["temperature"], 0.1);
  assert_eq!(sent["messages"][0], json!({ "role": "system", "content": "Be brief" }));
  assert_eq!(sent["messages"][2], json!({ "role": "assistant", "content": "hello" }));
}

#[tokio::test]
async fn streams_gemini_output() {
  let server = MockServer::start().await;
  let body: String = ["Hel", "lo"]
    .iter()
    .map(|text| format!("data: {}\n\n", json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })))
    .collect();
  Mock::given(method("POST"))
    .and(path("/models/test-model:streamGenerateContent"))
    .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
    .expect(1)
    .mount(&server)
    .await;

  let response = app(&server, "gemini", Some("g-key"))
    .oneshot(chat_request(json!({
      "contents": [{ "role": "user", "parts": [{ "text": "greet me" }] }],
      "options": { "jsonMode": true, "enableSearch": true }
    })))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::OK);
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  assert_eq!(&bytes[..], b"Hello");

  let sent: Value = server.received_requests().await.unwrap()[0].body_json().unwrap();
  assert_eq!(sent["generationConfig"]["responseMimeType"], "application/json");
  assert_eq!(sent["tools"], json!([{ "googleSearch": {} }]));
}

#[tokio::test]
async fn blocked_content_returns_client_error_without_calling_gemini() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(200))
    .expect(0)
    .mount(&server)
    .await;

  let response = app(&server, "google", Some("g-key"))
    .oneshot(chat_request(json!({
      "contents": [{ "role": "user", "parts": [{ "text": "tell me something FORBIDDEN" }] }]
    })))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn unknown_provider_is_a_json_client_error() {
  let server = MockServer::start().await;
  let response = app(&server, "mystery", Some("key"))
    .oneshot(chat_request(hello()))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert_eq!(json_body(response).await["error"], "Unknown provider: mystery");
}

#[tokio::test]
async fn rejected_vendor_key_becomes_client_error() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": { "message": "bad key" } })))
    .mount(&server)
    .await;

  let response = app(&server, &server.uri(), Some("sk-wrong"))
    .oneshot(chat_request(hello()))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert_eq!(json_body(response).await["error"], "Invalid API Key for this provider.");
}

#[tokio::test]
async fn upstream_failure_before_first_chunk_is_500() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
    .mount(&server)
    .await;

  let response = app(&server, &server.uri(), Some("sk-test"))
    .oneshot(chat_request(hello()))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  assert!(json_body(response).await["error"].as_str().unwrap().contains("bad gateway"));
}

#[tokio::test]
async fn failure_after_first_chunk_aborts_the_stream() {
  let server = MockServer::start().await;
  let body = format!(
    "data: {}\n\ndata: {{not json\n\n",
    json!({ "choices": [{ "delta": { "content": "partial" } }] })
  );
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
    .mount(&server)
    .await;

  let response = app(&server, &server.uri(), Some("sk-test"))
    .oneshot(chat_request(hello()))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::OK);
  assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
}

#[tokio::test]
async fn empty_stream_still_completes() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"))
    .mount(&server)
    .await;

  let response = app(&server, &server.uri(), Some("sk-test"))
    .oneshot(chat_request(hello()))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::OK);
  assert!(to_bytes(response.into_body(), usize::MAX).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_json_client_error() {
  let server = MockServer::start().await;
  let response = app(&server, &server.uri(), Some("sk-test"))
    .oneshot(chat_request(json!({ "messages": [] })))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn health_reports_ok() {
  let server = MockServer::start().await;
  let response = app(&server, "", None)
    .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(json_body(response).await, json!({ "status": "ok" }));
}
