use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use video_pipeline::{
    server, CredentialSource, ExecCtx, GenerationConfig, RequestHandler, ServerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let credential = CredentialSource::from_env();
    if credential.resolve().is_none() {
        warn!("provider API token is not set; requests will fail until it is");
    }

    let ctx = ExecCtx::builder(&config.base_url)
        .credential(credential)
        .generation(GenerationConfig::default())
        .timeout(config.request_timeout)
        .build();
    let handler = Arc::new(RequestHandler::new(Arc::new(ctx)));

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    info!("Starting video pipeline server on {}", addr);

    axum::serve(listener, server::router(handler)).await?;
    Ok(())
}
