//! malefircd - an RFC 1459/2812 IRC server with IRCv3 CAP/SASL/message-tags support.

mod caps;
mod config;
mod db;
mod error;
mod handlers;
mod network;
mod state;

use std::sync::Arc;

use tracing::{error, info};

use crate::config::{Config, LogFormat, StoreKind};
use crate::db::memory::MemoryStore;
use crate::db::sqlite::SqliteStore;
use crate::db::Store;
use crate::handlers::HandlerContext;
use crate::state::World;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).json().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).init();
        }
    }

    info!(server = %config.server_name, port = config.port, "starting malefircd");

    let store: Arc<dyn Store> = match config.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Sqlite => Arc::new(SqliteStore::connect(&config.store_connection).await?),
    };

    let ctx = Arc::new(HandlerContext {
        world: Arc::new(World::new()),
        store,
        config: Arc::new(config.clone()),
    });
    let config = Arc::new(config);

    let plain = tokio::spawn(network::gateway::run_plain(Arc::clone(&ctx), Arc::clone(&config)));
    let tls = if config.tls_enabled {
        Some(tokio::spawn(network::gateway::run_tls(Arc::clone(&ctx), Arc::clone(&config))))
    } else {
        None
    };

    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        res = plain => {
            if let Err(e) = res {
                error!(error = %e, "plain listener task panicked");
            }
        }
    }

    if let Some(handle) = tls {
        handle.abort();
    }
    Ok(())
}
