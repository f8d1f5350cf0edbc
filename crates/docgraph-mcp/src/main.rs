mod config;
mod error;
mod server;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use docgraph_common::backend::{BackendClient, BackendClientConfig};
use error::AppError;
use server::DocGraphServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting docgraph MCP server");

    let config = Config::from_env()?;
    info!(
        tenant_id = %config.tenant_id,
        llm_provider = %config.llm_provider,
        llm_model = %config.llm_model,
        locale = config.locale().as_str(),
        report_dir = %config.report_dir,
        "configuration loaded"
    );

    let backend_config = BackendClientConfig::from_env();
    info!(
        base_url = %backend_config.base_url,
        timeout_secs = backend_config.default_timeout.as_secs(),
        max_retries = backend_config.max_retries,
        "backend client configured"
    );
    let backend = Arc::new(BackendClient::new(backend_config).map_err(AppError::from)?);

    let server = DocGraphServer::new(backend, config);

    if let Ok(addr) = std::env::var("MCP_TCP_LISTEN_ADDR") {
        let listener = TcpListener::bind(&addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                tracing::info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                tracing::info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}
