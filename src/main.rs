use llm_gateway::{providers, server, GatewayConfig};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env file is fine; real environment variables still apply
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let config = GatewayConfig::from_env()?;
    if !config.provider.is_empty()
        && !config.provider.starts_with("http")
        && !providers::is_supported_provider(&config.provider)
    {
        warn!(provider = %config.provider, "unknown provider; chat requests will be rejected");
    }
    if config.model.is_empty() {
        warn!("MODEL is not set and the provider has no default model");
    }

    server::serve(config).await
}
