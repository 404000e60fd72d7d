//! mcp-mailsnap server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use mailsnap_client::{HeadlessRenderer, RenderCoordinator, SettleStrategy};
use mailsnap_core::{AppConfig, SnapshotStore};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(cache_dir = %config.cache_dir.display(), max_entries = config.max_entries, "Starting mcp-mailsnap server on stdio transport");

    let store = SnapshotStore::open(config.store_config()).await;
    let coordinator = launch_renderer(&config, &store).await;

    let handler = handler::McpSnapServer::new(config, store.clone(), coordinator);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    store.close().await?;
    Ok(())
}

/// Start the headless browser, or run cache-only if it is disabled or unavailable.
async fn launch_renderer(config: &AppConfig, store: &SnapshotStore) -> Option<RenderCoordinator<HeadlessRenderer>> {
    if !config.render_enabled {
        tracing::info!("rendering disabled, serving cached pages only");
        return None;
    }

    match HeadlessRenderer::new(config.render_timeout()).await {
        Ok(renderer) => {
            let settle = SettleStrategy::from_mode(config.settle_mode, config.settle_delay());
            Some(RenderCoordinator::new(Arc::new(renderer), store.clone(), settle))
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to launch browser, serving cached pages only");
            None
        }
    }
}
