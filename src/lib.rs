//! Streaming chat gateway.
//! One configured provider (Gemini or any OpenAI-compatible vendor) serves `POST /ai/chat`,
//! with generated text relayed to the caller chunk by chunk.

pub mod config;
pub mod error;
pub mod modules;
pub mod providers;
pub mod server;

pub use config::GatewayConfig;
pub use error::GatewayError;
