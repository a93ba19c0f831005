pub mod api;
pub mod config;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Pipeline setup: {0}")]
    Pipeline(#[from] pipeline::BuildError),

    #[error("Failed to start HTTP server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Load configuration, build the pipeline and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Optional .env next to the binary or in the working directory.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::Config::from_env()?;
    if config.vision_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; vision requests are sent unauthenticated");
    }

    let dispatcher = pipeline::build_dispatcher(&config)?;
    let ctx = api::ApiContext::new(Arc::new(dispatcher));
    let mut server =
        api::start_api_server(ctx, config.bind_addr, config.max_upload_bytes).await?;
    tracing::info!(
        addr = %server.session.server_addr,
        started_at = %server.session.started_at,
        "avi-ingest ready"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    server.shutdown();
    server.stopped().await;

    Ok(())
}
