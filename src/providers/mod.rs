//! Providers module
//! Centralized provider management for AI models

pub mod adapters;
pub mod constants;

pub use adapters::{
    supported_providers, ChatOptions, ChatSink, Content, ImageOptions, Part, ProviderAdapter,
    ProviderFactory, ResolvedProvider, Role, StreamUsage, SystemInstruction, TokenCount,
};
pub use constants::{get_base_url, get_default_model};

/// Check if a provider name is one of the named providers
pub fn is_supported_provider(provider: &str) -> bool {
    supported_providers().contains(&provider.to_lowercase().as_str())
}
