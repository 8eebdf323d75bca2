//! TCP server: snapshot load, store spawn, accept loop.

use std::path::Path;
use std::time::Duration;

use cinder_core::{load_databases, spawn_store, StoreConfig, StoreHandle, DUMP_FILE};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::connection;

/// Loads the snapshot, spawns the store task, and runs the accept loop
/// on an already-bound listener.
pub async fn run(
    listener: TcpListener,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let dump_path = Path::new(DUMP_FILE).to_path_buf();

    let databases = load_databases(&dump_path, config.databases)?;
    let loaded: usize = databases.iter().map(|db| db.len()).sum();
    if loaded > 0 {
        info!(keys = loaded, "database loaded from disk");
    }

    let store = spawn_store(
        databases,
        StoreConfig {
            save_rules: config.save_rules.clone(),
            dump_path,
        },
    );

    serve(
        listener,
        store,
        config.databases,
        Duration::from_secs(config.timeout),
    )
    .await?;
    Ok(())
}

/// The accept loop: one handler task per connection, each holding a
/// cheap clone of the store handle.
pub async fn serve(
    listener: TcpListener,
    store: StoreHandle,
    databases: usize,
    idle_timeout: Duration,
) -> std::io::Result<()> {
    info!("ready to accept connections on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let store = store.clone();

        tokio::spawn(async move {
            if let Err(e) = connection::handle(stream, store, databases, idle_timeout).await {
                error!("connection error from {peer}: {e}");
            }
        });
    }
}
