//! Fee estimation.
//!
//! A direct pass-through to the endpoint's EIP-1559 fee suggestion. Fees are
//! fetched fresh for every transfer with no smoothing, capping or caching.

use crate::blockchain::pool::BoundEndpoint;
use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::types::{BlockchainResult, FeeParameters};

#[derive(Debug, Clone, Copy, Default)]
pub struct FeeEstimator;

impl FeeEstimator {
    pub fn new() -> Self {
        Self
    }

    pub async fn current_fees<R: ChainRpc>(
        &self,
        endpoint: &BoundEndpoint<R>,
    ) -> BlockchainResult<FeeParameters> {
        let fees = endpoint.rpc().fee_suggestion().await?;
        tracing::debug!(
            max_fee_per_gas = fees.max_fee_per_gas,
            max_priority_fee_per_gas = fees.max_priority_fee_per_gas,
            "Fee suggestion"
        );
        Ok(fees)
    }
}
