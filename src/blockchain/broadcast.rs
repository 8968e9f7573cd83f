//! Broadcast and confirmation monitoring.
//!
//! # Responsibilities
//! - Submit a signed payload to the bound endpoint
//! - Poll for the receipt until the required inclusion depth is reached
//!
//! Waiting never resubmits: it only reads receipts, so it can be called any
//! number of times for the same hash.

use std::time::Duration;

use alloy::primitives::TxHash;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::pool::BoundEndpoint;
use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::transaction::SignedTransfer;
use crate::blockchain::types::{BlockchainError, BlockchainResult, Confirmation};
use crate::config::TransferConfig;

#[derive(Debug, Clone)]
pub struct Broadcaster {
    required_confirmations: u32,
    timeout_duration: Duration,
    poll_interval: Duration,
}

impl Broadcaster {
    pub fn new(required_confirmations: u32, timeout_duration: Duration, poll_interval: Duration) -> Self {
        Self {
            required_confirmations: required_confirmations.max(1),
            timeout_duration,
            poll_interval,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(
            config.confirmation_blocks,
            Duration::from_secs(config.confirmation_timeout_secs),
            Duration::from_millis(config.confirmation_poll_ms),
        )
    }

    /// Hand the payload to the node. Returns the hash the node reports.
    pub async fn submit<R: ChainRpc>(
        &self,
        endpoint: &BoundEndpoint<R>,
        signed: &SignedTransfer,
    ) -> BlockchainResult<TxHash> {
        let tx_hash = endpoint.rpc().send_raw_transaction(signed.raw().clone()).await?;
        if tx_hash != signed.tx_hash() {
            tracing::warn!(
                local = %signed.tx_hash(),
                reported = %tx_hash,
                "Endpoint reported a different transaction hash"
            );
        }
        tracing::info!(tx_hash = %tx_hash, endpoint = %endpoint.url(), "Transaction accepted");
        Ok(tx_hash)
    }

    /// Wait until `tx_hash` is included at the required depth.
    ///
    /// Polling errors are logged and retried until the deadline; the outcome
    /// of a timed out wait is unknown, the transaction may still land.
    pub async fn wait_for_confirmation<R: ChainRpc>(
        &self,
        endpoint: &BoundEndpoint<R>,
        tx_hash: TxHash,
    ) -> BlockchainResult<Confirmation> {
        let result = timeout(self.timeout_duration, async {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let receipt = match endpoint.rpc().receipt(tx_hash).await {
                    Ok(Some(r)) => r,
                    Ok(None) => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                        continue;
                    }
                };

                if !receipt.success {
                    return Err(BlockchainError::Reverted {
                        tx_hash,
                        block_number: receipt.block_number,
                    });
                }

                if self.required_confirmations == 1 {
                    return Ok(Confirmation {
                        tx_hash,
                        block_number: receipt.block_number,
                    });
                }

                let current_block = match endpoint.rpc().block_number().await {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!(tx_hash = %tx_hash, error = %e, "Block height poll failed");
                        continue;
                    }
                };
                // The including block counts as the first confirmation.
                let confirmations = current_block.saturating_sub(receipt.block_number) + 1;

                if confirmations >= self.required_confirmations as u64 {
                    return Ok(Confirmation {
                        tx_hash,
                        block_number: receipt.block_number,
                    });
                }

                tracing::debug!(
                    tx_hash = %tx_hash,
                    confirmations,
                    required = self.required_confirmations,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(BlockchainError::ConfirmationTimeout {
                tx_hash,
                waited_secs: self.timeout_duration.as_secs(),
            }),
        }
    }
}
