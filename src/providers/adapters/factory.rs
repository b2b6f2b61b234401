//! Provider Adapter Factory
//! Picks the adapter (and base URL) for a configured provider name

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::gemini::GeminiAdapter;
use super::openai::OpenAICompatibleAdapter;
use super::traits::ProviderAdapter;
use crate::error::GatewayError;
use crate::modules::ContentFilter;
use crate::providers::constants::{GEMINI_ALIASES, PROVIDER_BASE_URLS};

// Vendor name -> OpenAI-compatible base URL
static VENDOR_BASE_URLS: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| PROVIDER_BASE_URLS.iter().copied().collect());

/// Adapter chosen for one request, plus the base URL it should call
pub struct ResolvedProvider {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub base_url: Option<String>,
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("adapter", &self.adapter.provider_name())
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct ProviderFactory {
    gemini: Arc<dyn ProviderAdapter>,
    compatible: Arc<dyn ProviderAdapter>,
}

impl ProviderFactory {
    pub fn new(gemini: Arc<dyn ProviderAdapter>, compatible: Arc<dyn ProviderAdapter>) -> Self {
        Self { gemini, compatible }
    }

    /// Build both adapters over one shared HTTP client
    pub fn from_parts(http: reqwest::Client, gemini_endpoint: &str, filter: Arc<ContentFilter>) -> Self {
        Self::new(
            Arc::new(GeminiAdapter::new(http.clone(), gemini_endpoint, filter)),
            Arc::new(OpenAICompatibleAdapter::new(http)),
        )
    }

    /// Resolve a provider name (case-insensitive) or a raw `http...` base URL
    pub fn resolve(&self, provider: &str) -> Result<ResolvedProvider, GatewayError> {
        let name = provider.to_lowercase();

        if GEMINI_ALIASES.contains(&name.as_str()) {
            return Ok(ResolvedProvider {
                adapter: self.gemini.clone(),
                base_url: None,
            });
        }

        if let Some(base_url) = VENDOR_BASE_URLS.get(name.as_str()) {
            return Ok(ResolvedProvider {
                adapter: self.compatible.clone(),
                base_url: Some(base_url.to_string()),
            });
        }

        if provider.starts_with("http") {
            return Ok(ResolvedProvider {
                adapter: self.compatible.clone(),
                base_url: Some(provider.to_string()),
            });
        }

        Err(GatewayError::bad_request(format!("Unknown provider: {provider}")))
    }
}

/// List all named providers
pub fn supported_providers() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = GEMINI_ALIASES
        .iter()
        .copied()
        .filter(|name| !name.is_empty())
        .collect();
    names.extend(PROVIDER_BASE_URLS.iter().map(|(name, _)| *name));
    names
}
