use tracing_subscriber::EnvFilter;

use doc_qa::api;
use doc_qa::config::Config;
use doc_qa::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Values already set in the environment win over .env
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env: {e}");
        }
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "Embeddings: {} {} ({})",
        config.embedding.provider,
        config.embedding.model,
        config.embedding.base_url
    );
    tracing::info!(
        "Chat model: {} {} ({})",
        config.llm.provider,
        config.llm.chat_model,
        config.llm.base_url
    );
    if config.embedding.provider.requires_key() && config.embedding.api_key.is_none() {
        tracing::warn!(
            "{} is not set; uploads will fail until it is configured",
            config.embedding.provider.key_env().unwrap_or("API key")
        );
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    tracing::info!("{} documents in registry", state.documents.len());

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
