use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use flirtina::config::Settings;
use flirtina::providers::{GeminiProvider, HuggingFaceProvider};
use flirtina::server::{create_router, AppState};
use flirtina::services::{ImageProxy, LlmProxy, RateLimiter};
use flirtina::telemetry::{init_tracing, TracingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let tracing_config = TracingConfig::default();
    init_tracing(&tracing_config);

    let settings = Settings::from_env();
    tracing::debug!(?settings, "Loaded settings");

    if settings.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; chat requests will fail");
    }
    if settings.hugging_face_api_key.is_none() {
        tracing::warn!("HUGGING_FACE_API_KEY is not set; image requests will fail");
    }
    if settings.dev_placeholder {
        tracing::warn!("Placeholder images enabled; do not use in production");
    }

    let llm = Arc::new(LlmProxy::new(
        Arc::new(GeminiProvider::new()),
        settings.gemini_api_key.clone(),
        settings.chat_model.clone(),
    ));
    let images = Arc::new(
        ImageProxy::new(
            Arc::new(HuggingFaceProvider::new()),
            settings.hugging_face_api_key.clone(),
            settings.image_models.clone(),
        )
        .with_dev_placeholder(settings.dev_placeholder),
    );
    let rate_limiter = Arc::new(RateLimiter::in_memory());
    let housekeeping = Arc::clone(&rate_limiter).spawn_housekeeping();

    let router = create_router(AppState::new(llm, images, rate_limiter));

    let addr = settings.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = %settings.environment,
        json_format = tracing_config.json_format,
        "Server listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    housekeeping.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
