//! Provider Adapter System
//! Provides a unified interface for different AI providers with provider-specific logic

pub mod factory;
pub mod traits;

mod base;
mod gemini;
mod openai;

pub use factory::{supported_providers, ProviderFactory, ResolvedProvider};
pub use gemini::GeminiAdapter;
pub use openai::OpenAICompatibleAdapter;
pub use traits::{
    ChatOptions, ChatSink, Content, ImageOptions, Part, ProviderAdapter, Role, StreamUsage,
    SystemInstruction, TokenCount,
};
