//! Transfer relay server.
//!
//! ```text
//!     HTTP request
//!         │
//!         ▼
//!   ┌────────────┐     ┌─────────────────┐     ┌──────────────┐
//!   │ http       │────▶│ TransferService │────▶│ EndpointPool │────▶ JSON-RPC
//!   │ handlers   │     │  clamp, build,  │     │  failover,   │      endpoints
//!   └────────────┘     │  sign, submit,  │     │  chain check │
//!                      │  confirm        │     └──────────────┘
//!                      └─────────────────┘
//! ```

use std::sync::Arc;

use tokio::net::TcpListener;

use transfer_relay::blockchain::EndpointPool;
use transfer_relay::config::load_from_env;
use transfer_relay::http::HttpServer;
use transfer_relay::lifecycle::{signals, startup, Shutdown};
use transfer_relay::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_from_env()?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        endpoints = config.network.endpoints.len(),
        chain_id = config.network.chain_id,
        "transfer-relay starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let pool = Arc::new(EndpointPool::from_config(&config.network));
    let wallet = startup::wallet_from_env()?;
    let service = startup::build_service(&config, pool, wallet).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, service);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result??;
        }
        _ = signals::wait_for_signal() => {
            shutdown.trigger();
            shutdown.drain(&mut server_task).await;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
