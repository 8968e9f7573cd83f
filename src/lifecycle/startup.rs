//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the endpoint pool and make a first, non-fatal connection attempt
//! - Load the signing key and assemble the transfer service
//! - Report what came up, so the server can start either way
//!
//! A missing key or an unreachable network does not stop the process;
//! `/status` and `/health` stay available. A present but unusable key or an
//! invalid transfer section is fatal.

use std::sync::Arc;

use thiserror::Error;

use crate::blockchain::{
    AccountState, BlockchainError, Broadcaster, ChainRpc, EndpointPool, Wallet,
};
use crate::config::validation::ValidationError;
use crate::config::RelayConfig;
use crate::transfer::{format_eth, TransferService, TransferSettings};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid signing key: {0}")]
    Wallet(#[from] BlockchainError),

    #[error("invalid transfer settings: {0}")]
    Settings(ValidationError),
}

/// Assemble the transfer service over `pool`.
///
/// Returns `Ok(None)` when no wallet is available.
pub async fn build_service<R: ChainRpc>(
    config: &RelayConfig,
    pool: Arc<EndpointPool<R>>,
    wallet: Option<Wallet>,
) -> Result<Option<Arc<TransferService<R>>>, StartupError> {
    // Best effort; a failure here only delays binding to the first request.
    match pool.ensure_connected().await {
        Ok(endpoint) => tracing::info!(
            endpoint = %endpoint.url(),
            chain_id = endpoint.chain_id(),
            "Connected to network"
        ),
        Err(e) => tracing::warn!(error = %e, "No endpoint reachable at startup"),
    }

    let Some(wallet) = wallet else {
        tracing::warn!("No signing key configured; transfers are disabled");
        return Ok(None);
    };

    let settings =
        TransferSettings::from_config(&config.transfer).map_err(StartupError::Settings)?;
    let broadcaster = Broadcaster::from_config(&config.transfer);
    let service = TransferService::new(pool, AccountState::new(wallet), settings, broadcaster);

    tracing::info!(wallet = %service.address(), "Transfer service ready");
    if let Some(balance) = service.observed_balance().await {
        tracing::info!(balance_eth = %format_eth(balance), "Initial balance");
    }

    Ok(Some(Arc::new(service)))
}

/// Read the signing key from the environment.
pub fn wallet_from_env() -> Result<Option<Wallet>, StartupError> {
    Ok(Wallet::from_env()?)
}
