// Web front door for the creative caption studio.
//
// Reads settings from flags / environment (a `.env` file is honored), wires
// the Stability and Gemini clients into the pipeline and serves the API plus
// the static front-end.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use caption_studio::providers::{GeminiClient, StabilityClient};
use caption_studio::{build_router, logging, Config, CreativePipeline, RateLimiter, RouterOptions};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::parse();
    logging::init(config.verbose, config.json_logs);
    config.validate()?;

    let pipeline = CreativePipeline::new(
        Arc::new(StabilityClient::new(config.stability_settings())?),
        Arc::new(GeminiClient::new(config.gemini_settings())?),
    );

    let limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window());
    let pruner = limiter.clone();
    let window = config.rate_limit_window();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(window.max(Duration::from_secs(1)));
        loop {
            tick.tick().await;
            pruner.prune();
            tracing::debug!(clients = pruner.tracked_clients(), "Pruned rate limiter");
        }
    });

    let public_dir = if config.public_dir.is_dir() {
        Some(config.public_dir.clone())
    } else {
        tracing::warn!(dir = %config.public_dir.display(), "Public directory not found; serving API only");
        None
    };

    let app = build_router(
        pipeline,
        RouterOptions {
            max_upload_bytes: config.max_upload_bytes(),
            limiter,
            public_dir,
        },
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    tracing::info!(
        "Server running on http://localhost:{}",
        listener.local_addr()?.port()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
