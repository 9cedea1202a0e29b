use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ragnest_api::config::log_filter;
use ragnest_api::{create_router, ApiConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(log_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_config = ApiConfig::from_env();
    let rag_config = api_config.rag_config().context("Invalid configuration")?;

    tracing::info!(
        port = api_config.port,
        data_dir = %rag_config.data_dir.value.display(),
        embedder = %rag_config.embedder.value,
        generator = %rag_config.generator.value,
        "Starting Ragnest API server"
    );

    let state = Arc::new(
        AppState::build(&rag_config, &api_config.ollama_url)
            .await
            .context("Failed to initialize retrieval core")?,
    );

    let cors = api_config.cors_layer().context("Invalid RAGNEST_CORS_ORIGIN")?;

    let app = create_router(state.clone()).layer(cors);

    let addr = api_config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("CORS enabled for {}", api_config.cors_origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await
        .context("Server error")?;

    state.shutdown().await;
    Ok(())
}
