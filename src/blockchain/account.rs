//! Account state: the signing credential plus read-through balance and nonce.
//!
//! Both reads go to the bound endpoint every time. Nothing is cached across
//! calls, and the two reads are independent of each other.

use alloy::primitives::{Address, U256};

use crate::blockchain::pool::BoundEndpoint;
use crate::blockchain::rpc::ChainRpc;
use crate::blockchain::types::BlockchainResult;
use crate::blockchain::wallet::Wallet;

/// The single relay account.
#[derive(Debug, Clone)]
pub struct AccountState {
    wallet: Wallet,
}

impl AccountState {
    pub fn new(wallet: Wallet) -> Self {
        Self { wallet }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// The signing credential, for the transaction assembler.
    pub fn signer(&self) -> &Wallet {
        &self.wallet
    }

    /// Current balance in wei.
    pub async fn balance<R: ChainRpc>(&self, endpoint: &BoundEndpoint<R>) -> BlockchainResult<U256> {
        let balance = endpoint.rpc().balance(self.address()).await?;
        tracing::debug!(address = %self.address(), %balance, "Balance read");
        Ok(balance)
    }

    /// Nonce for the next transaction, counting transactions still pending.
    pub async fn pending_nonce<R: ChainRpc>(
        &self,
        endpoint: &BoundEndpoint<R>,
    ) -> BlockchainResult<u64> {
        let nonce = endpoint.rpc().pending_nonce(self.address()).await?;
        tracing::debug!(address = %self.address(), nonce, "Pending nonce read");
        Ok(nonce)
    }
}
