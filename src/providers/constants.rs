//! Provider configuration constants
//! Centralized configuration for all AI providers

/// Base URLs for OpenAI-compatible vendors
pub const PROVIDER_BASE_URLS: &[(&str, &str)] = &[
  ("openai", "https://api.openai.com/v1"),
  ("deepseek", "https://api.deepseek.com"),
  ("moonshot", "https://api.moonshot.cn/v1"),
  ("qwen", "https://dashscope.aliyuncs.com/compatible-mode/v1"),
  ("zhipu", "https://open.bigmodel.cn/api/paas/v4"),
  ("yi", "https://api.01.ai/v1"),
  // Doubao expects an endpoint ID as the model name
  ("doubao", "https://ark.cn-beijing.volces.com/api/v3"),
];

/// Default models for each provider
pub const DEFAULT_MODELS: &[(&str, &str)] = &[
  ("gemini", "gemini-2.0-flash"),
  ("openai", "gpt-4o-mini"),
  ("deepseek", "deepseek-chat"),
  ("moonshot", "moonshot-v1-8k"),
  ("qwen", "qwen-plus"),
  ("zhipu", "glm-4-flash"),
  ("yi", "yi-lightning"),
];

/// Model used when the provider is a raw base URL
pub const DEFAULT_COMPATIBLE_MODEL: &str = "gpt-4o-mini";

/// Image model for the Gemini adapter when none is given
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

/// Size for OpenAI-compatible image generation when none is given
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Sampling temperature when the caller leaves it unset
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Names that select the dedicated Gemini adapter
pub const GEMINI_ALIASES: &[&str] = &["", "google", "gemini"];

/// Get base URL for a provider
pub fn get_base_url(provider: &str) -> Option<&'static str> {
  PROVIDER_BASE_URLS.iter().find(|(p, _)| *p == provider).map(|(_, url)| *url)
}

/// Get default model for a provider
pub fn get_default_model(provider: &str) -> Option<&'static str> {
  let provider = provider.to_lowercase();
  if GEMINI_ALIASES.contains(&provider.as_str()) {
    return get_default_model_exact("gemini");
  }
  if provider.starts_with("http") {
    return Some(DEFAULT_COMPATIBLE_MODEL);
  }
  get_default_model_exact(&provider)
}

fn get_default_model_exact(provider: &str) -> Option<&'static str> {
  DEFAULT_MODELS.iter().find(|(p, _)| *p == provider).map(|(_, model)| *model)
}
