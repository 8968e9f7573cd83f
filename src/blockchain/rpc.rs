//! JSON-RPC access to a single network endpoint.
//!
//! # Responsibilities
//! - Define the network operations the transfer pipeline needs (`ChainRpc`)
//! - Implement them over an alloy HTTP provider with per-call timeouts
//! - Classify failures: transport (`Rpc`/`Timeout`) vs node rejection (`Rejected`)

use std::future::{Future, IntoFuture};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::transports::{TransportError, TransportResult};
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainError, BlockchainResult, FeeParameters, ReceiptSummary};

/// Network operations against one endpoint. Each method is one round trip.
pub trait ChainRpc: Send + Sync + 'static {
    /// Chain ID reported by the endpoint.
    fn chain_id(&self) -> impl Future<Output = BlockchainResult<u64>> + Send;

    /// Latest block height. Used as the liveness probe.
    fn block_number(&self) -> impl Future<Output = BlockchainResult<u64>> + Send;

    /// Native balance of `address` in wei.
    fn balance(&self, address: Address) -> impl Future<Output = BlockchainResult<U256>> + Send;

    /// Transaction count of `address` including transactions still in the pending pool.
    fn pending_nonce(&self, address: Address)
        -> impl Future<Output = BlockchainResult<u64>> + Send;

    /// The endpoint's current fee suggestion.
    fn fee_suggestion(&self) -> impl Future<Output = BlockchainResult<FeeParameters>> + Send;

    /// Submit an EIP-2718 encoded signed transaction.
    fn send_raw_transaction(
        &self,
        raw: Bytes,
    ) -> impl Future<Output = BlockchainResult<TxHash>> + Send;

    /// Receipt of an included transaction, `None` while it is pending.
    fn receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = BlockchainResult<Option<ReceiptSummary>>> + Send;
}

/// `ChainRpc` over an alloy HTTP provider.
#[derive(Clone)]
pub struct AlloyRpc {
    provider: DynProvider,
    timeout_duration: Duration,
}

impl AlloyRpc {
    /// Create a client for `url`. No network traffic happens here; the
    /// provider connects lazily on the first call.
    pub fn connect(url: &str, rpc_timeout_secs: u64) -> BlockchainResult<Self> {
        let parsed: url::Url = url
            .parse()
            .map_err(|e| BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", url, e)))?;

        Ok(Self {
            provider: ProviderBuilder::new().connect_http(parsed).erased(),
            timeout_duration: Duration::from_secs(rpc_timeout_secs),
        })
    }

    async fn call<T, F>(&self, fut: F) -> BlockchainResult<T>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        match timeout(self.timeout_duration, fut.into_future()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(e)),
            Err(_) => Err(BlockchainError::Timeout(self.timeout_duration.as_secs())),
        }
    }
}

/// JSON-RPC error responses come from the node and are kept verbatim;
/// everything else is a transport failure.
fn classify(err: TransportError) -> BlockchainError {
    match err.as_error_resp() {
        Some(payload) => BlockchainError::Rejected(payload.message.to_string()),
        None => BlockchainError::Rpc(err.to_string()),
    }
}

impl ChainRpc for AlloyRpc {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        self.call(self.provider.get_chain_id()).await
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.call(self.provider.get_block_number()).await
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.call(self.provider.get_balance(address)).await
    }

    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.call(self.provider.get_transaction_count(address).pending()).await
    }

    async fn fee_suggestion(&self) -> BlockchainResult<FeeParameters> {
        let estimate = self.call(self.provider.estimate_eip1559_fees()).await?;
        Ok(FeeParameters {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        let pending = self.call(self.provider.send_raw_transaction(&raw)).await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        let receipt = self
            .call(self.provider.get_transaction_receipt(tx_hash))
            .await?;

        Ok(receipt.and_then(|r| {
            r.block_number.map(|block_number| ReceiptSummary {
                block_number,
                success: r.status(),
            })
        }))
    }
}

impl std::fmt::Debug for AlloyRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyRpc")
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_rejects_invalid_url() {
        let err = AlloyRpc::connect("not a url", 5).unwrap_err();
        assert!(err.to_string().contains("Invalid RPC URL"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_failure() {
        // Port 9 (discard) on localhost is not an RPC server.
        let rpc = AlloyRpc::connect("http://127.0.0.1:9", 2).unwrap();
        let err = rpc.block_number().await.unwrap_err();
        assert!(err.is_endpoint_failure());
    }
}
