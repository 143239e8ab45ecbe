//! roamsync server entry point.
//!
//! Boots the offline queue (local database, REST backend, sync engine) and
//! serves it as an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use roamsync_client::{RestBackend, SyncEngine, SyncOptions};
use roamsync_core::{AppConfig, ConnectivityMonitor, LocalDb};

mod error;
mod handler;
mod notify;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let user_id = config.require_user_id()?.to_string();
    let backend = RestBackend::from_app_config(&config)?;

    let db = LocalDb::open_or_memory(&config.db_path).await?;
    let connectivity = Arc::new(ConnectivityMonitor::new(Some(config.assume_online)));
    let engine = Arc::new(SyncEngine::new(
        db,
        Arc::new(backend),
        connectivity,
        user_id,
        SyncOptions::from_config(&config),
    ));

    tracing::info!(db_path = %config.db_path.display(), "Starting roamsync server on stdio transport");

    // subscribe before start so the initial pass is reported
    let events = engine.subscribe();
    let _listener = engine.start().await;
    let _sweeper = config
        .cache_sweep_interval()
        .map(|interval| engine.spawn_cache_sweeper(interval));

    let handler = handler::RoamsyncServer::new(engine);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;
    let _relay = notify::spawn_event_relay(events, server.peer().clone());

    server.waiting().await?;

    Ok(())
}
