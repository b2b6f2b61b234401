//! Process-level configuration
//! Read once at startup from the environment (and an optional `.env` file)

use crate::error::GatewayError;
use crate::providers::constants::{get_default_model, DEFAULT_GEMINI_ENDPOINT};
use std::path::PathBuf;
use url::Url;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Provider name or raw base URL; empty means Gemini
    pub provider: String,
    pub api_key: Option<String>,
    /// May be empty when the provider has no default model
    pub model: String,
    /// CORS origins; empty allows any origin
    pub allowed_origins: Vec<String>,
    pub gemini_endpoint: String,
    pub sensitive_words_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            provider: String::new(),
            api_key: None,
            model: get_default_model("").unwrap_or_default().to_string(),
            allowed_origins: Vec::new(),
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            sensitive_words_path: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let provider = get("PROVIDER").unwrap_or_default();
        let model = get("MODEL")
            .or_else(|| get_default_model(&provider).map(str::to_string))
            .unwrap_or_default();
        let (host, port) = resolve_host_and_port(get("HOST"), get("PORT"), get("PUBLIC_BACKEND_URL"))?;

        let gemini_endpoint = match get("GEMINI_BASE_URL") {
            Some(endpoint) => {
                Url::parse(&endpoint)
                    .map_err(|err| GatewayError::Config(format!("GEMINI_BASE_URL: {err}")))?;
                endpoint
            }
            None => DEFAULT_GEMINI_ENDPOINT.to_string(),
        };

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            provider,
            api_key: get("API_KEY"),
            model,
            allowed_origins,
            gemini_endpoint,
            sensitive_words_path: get("SENSITIVE_WORDS_PATH").map(PathBuf::from),
        })
    }
}

/// HOST/PORT win; otherwise fill the gaps from PUBLIC_BACKEND_URL, then defaults
fn resolve_host_and_port(
    host: Option<String>,
    port: Option<String>,
    public_url: Option<String>,
) -> Result<(String, u16), GatewayError> {
    let port = port
        .map(|value| {
            value
                .parse::<u16>()
                .map_err(|err| GatewayError::Config(format!("PORT {value:?}: {err}")))
        })
        .transpose()?;

    if let (Some(host), Some(port)) = (host.clone(), port) {
        return Ok((host, port));
    }

    let from_url = public_url.as_deref().and_then(parse_host_port_from_url);
    let host = host
        .or_else(|| from_url.as_ref().map(|(host, _)| host.clone()))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = port
        .or_else(|| from_url.as_ref().and_then(|(_, port)| *port))
        .unwrap_or(DEFAULT_PORT);
    Ok((host, port))
}

fn parse_host_port_from_url(raw: &str) -> Option<(String, Option<u16>)> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_string();
    Some((host, url.port()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<GatewayConfig, GatewayError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_to_gemini_on_port_3000() {
        let config = load(&[]).unwrap();
        assert_eq!(config.provider, "");
        assert_eq!(config.api_key, None);
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!((config.host.as_str(), config.port), ("0.0.0.0", 3000));
        assert_eq!(config.gemini_endpoint, DEFAULT_GEMINI_ENDPOINT);
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn reads_provider_key_and_model() {
        let config = load(&[
            ("PROVIDER", "deepseek"),
            ("API_KEY", " sk-123 "),
            ("ALLOWED_ORIGINS", "http://a.test, ,http://b.test"),
        ])
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-123"));
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.allowed_origins, vec!["http://a.test", "http://b.test"]);

        let config = load(&[("PROVIDER", "doubao"), ("MODEL", "ep-2024"), ("API_KEY", "")]).unwrap();
        assert_eq!(config.model, "ep-2024");
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn public_url_fills_missing_host_and_port() {
        let config = load(&[("PUBLIC_BACKEND_URL", "http://10.0.0.5:8080/api")]).unwrap();
        assert_eq!((config.host.as_str(), config.port), ("10.0.0.5", 8080));

        let config = load(&[("PORT", "9000"), ("PUBLIC_BACKEND_URL", "http://10.0.0.5:8080")]).unwrap();
        assert_eq!((config.host.as_str(), config.port), ("10.0.0.5", 9000));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(load(&[("PORT", "eighty")]), Err(GatewayError::Config(_))));
        assert!(matches!(load(&[("GEMINI_BASE_URL", "not a url")]), Err(GatewayError::Config(_))));
    }
}
