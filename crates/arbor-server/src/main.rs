//! ArborDB server binary.
//!
//! Usage: `arbor-server [config.json]`. Log verbosity follows `RUST_LOG`
//! (default `info`).

use std::env;
use std::sync::Arc;

use arbor_common::ArborConfig;
use arbor_server::{Executor, Server, UserStore};
use arbor_storage::Catalog;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = match env::args().nth(1) {
        Some(path) => ArborConfig::load(&path)?,
        None => {
            let config = ArborConfig::default();
            config.validate()?;
            config
        }
    };

    let catalog = Arc::new(Catalog::new(&config.storage)?);
    let users = UserStore::open(&config.server.users_file)?;
    info!(accounts = users.len(), require_auth = config.server.require_auth, "user store loaded");
    let executor = Arc::new(Executor::new(catalog, users, config.server.require_auth));

    let server = Server::bind(&config.server, executor).await?;
    info!(
        addr = %server.local_addr()?,
        max_connections = config.server.max_connections,
        "arbor-server listening"
    );
    server.serve_with_shutdown(shutdown_signal()).await?;
    Ok(())
}
