//! glimt-server — rendezvous and relay daemon for glimt sessions.
//!
//! Takes no arguments: it binds the well-known port and serves until
//! killed. `RUST_LOG` controls verbosity.

mod manager;
mod server;
mod session;

use glimt_core::DEFAULT_PORT;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::server::Server;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("glimt-server v{}", env!("CARGO_PKG_VERSION"));

    let server = match Server::bind(&format!("0.0.0.0:{DEFAULT_PORT}")).await {
        Ok(server) => server,
        Err(e) => {
            error!("cannot bind port {DEFAULT_PORT}: {e}");
            std::process::exit(1);
        }
    };
    info!("relay listening on {}", server.local_addr());
    server.run().await;
}
