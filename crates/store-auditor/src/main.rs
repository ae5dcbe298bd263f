mod analyzer;
mod audit;
mod config;
mod error;
mod extract;
mod fetcher;
mod model;
mod report;
mod server;
mod session;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use audit_common::openai::OpenAiClient;
use analyzer::Analyzer;
use config::Config;
use fetcher::Fetcher;
use server::AppState;
use session::SessionSlot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting store-auditor");

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        fetch_timeout_ms = config.fetch_timeout.as_millis() as u64,
        model = %config.model,
        base_url = %config.openai.base_url,
        model_timeout_ms = config.openai.default_timeout.map(|t| t.as_millis() as u64),
        "configuration loaded"
    );

    let fetcher = Fetcher::new(config.fetch_timeout)?;
    let openai = Arc::new(OpenAiClient::new(config.openai.clone())?);
    let analyzer = Analyzer::new(openai, config.model.clone());
    let state = AppState::new(fetcher, analyzer, SessionSlot::new());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("web UI listening on http://{}", config.bind_addr);

    axum::serve(listener, server::router(state))
        .await
        .inspect_err(|e| tracing::error!(error = %e, "web server error"))?;

    info!("store-auditor shut down");
    Ok(())
}
