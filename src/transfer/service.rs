//! Transfer orchestration.
//!
//! # Data Flow
//! ```text
//! ExecuteTransfer(request)
//!     → EndpointPool::ensure_connected        (ConnectionEnsured)
//!     → AccountState::balance → AmountClamper (BalanceChecked)
//!     → AccountState::pending_nonce + FeeEstimator::current_fees (FeesFetched)
//!     → TransactionAssembler::assemble         (Assembled)
//!     → Broadcaster::submit                    (Broadcast)
//!     → Broadcaster::wait_for_confirmation     (Confirmed)
//! ```
//!
//! A failure at any stage ends the call with that stage's error; nothing is
//! retried here except endpoint selection inside the pool.

use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, U256};
use tokio::sync::Mutex;

use crate::blockchain::{
    AccountState, AlloyRpc, BlockchainError, BoundEndpoint, Broadcaster, ChainRpc, EndpointPool,
    FeeEstimator, TransactionAssembler, TRANSFER_GAS_LIMIT,
};
use crate::config::validation::ValidationError;
use crate::config::TransferConfig;
use crate::observability::metrics;
use crate::transfer::clamp::AmountClamper;
use crate::transfer::types::{TransferError, TransferReceipt, TransferRequest, TransferStage};

/// Transfer policy resolved from configuration.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub default_amount: U256,
    pub reserve: U256,
    pub fallback_destination: Address,
    pub serialize_submissions: bool,
}

impl TransferSettings {
    pub fn from_config(config: &TransferConfig) -> Result<Self, ValidationError> {
        let default_amount = parse_ether(&config.default_amount).map_err(|e| {
            ValidationError::new("transfer.default_amount", e.to_string())
        })?;
        let reserve = parse_ether(&config.reserve)
            .map_err(|e| ValidationError::new("transfer.reserve", e.to_string()))?;
        let fallback_destination = config.fallback_destination.parse().map_err(|_| {
            ValidationError::new(
                "transfer.fallback_destination",
                format!("'{}' is not an address", config.fallback_destination),
            )
        })?;

        Ok(Self {
            default_amount,
            reserve,
            fallback_destination,
            serialize_submissions: config.serialize_submissions,
        })
    }
}

/// The relay's single public operation, plus balance reads for the adapter.
pub struct TransferService<R: ChainRpc = AlloyRpc> {
    pool: Arc<EndpointPool<R>>,
    account: AccountState,
    fees: FeeEstimator,
    clamper: AmountClamper,
    assembler: TransactionAssembler,
    broadcaster: Broadcaster,
    default_amount: U256,
    fallback_destination: Address,
    /// Held from balance read until the node accepts the transaction.
    submissions: Option<Mutex<()>>,
}

impl<R: ChainRpc> TransferService<R> {
    pub fn new(
        pool: Arc<EndpointPool<R>>,
        account: AccountState,
        settings: TransferSettings,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            pool,
            account,
            fees: FeeEstimator::new(),
            clamper: AmountClamper::new(settings.reserve),
            assembler: TransactionAssembler::new(),
            broadcaster,
            default_amount: settings.default_amount,
            fallback_destination: settings.fallback_destination,
            submissions: settings.serialize_submissions.then(|| Mutex::new(())),
        }
    }

    pub fn address(&self) -> Address {
        self.account.address()
    }

    pub fn pool(&self) -> &Arc<EndpointPool<R>> {
        &self.pool
    }

    /// Send funds and wait for inclusion.
    pub async fn execute_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        let started = Instant::now();
        let result = self.run(request).await;

        match &result {
            Ok(receipt) => {
                metrics::record_transfer("confirmed", started);
                tracing::info!(
                    tx_hash = %receipt.tx_hash,
                    block_number = receipt.block_number,
                    nonce = receipt.nonce,
                    clamped = receipt.was_clamped(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Transfer confirmed"
                );
            }
            Err(e) => metrics::record_transfer(e.kind(), started),
        }

        result
    }

    async fn run(&self, request: TransferRequest) -> Result<TransferReceipt, TransferError> {
        let requested = request.amount.unwrap_or(self.default_amount);
        let destination = request.destination.unwrap_or(self.fallback_destination);
        let mut stage = TransferStage::Idle;

        let endpoint = match self.pool.ensure_connected().await {
            Ok(e) => e,
            Err(e) => return Err(self.fail(stage, TransferError::from_connection(e))),
        };
        stage = TransferStage::ConnectionEnsured;

        let guard = match &self.submissions {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let balance = match self.account.balance(&endpoint).await {
            Ok(b) => b,
            Err(e) => {
                return Err(self
                    .abort(&endpoint, stage, e, |e| TransferError::Endpoint(e.to_string()))
                    .await)
            }
        };
        let clamped = self
            .clamper
            .clamp(requested, balance)
            .map_err(|e| self.fail(stage, e))?;
        if clamped.was_reduced() {
            tracing::info!(
                requested = %clamped.requested,
                amount = %clamped.amount,
                %balance,
                "Transfer amount reduced to fit balance"
            );
        }
        stage = TransferStage::BalanceChecked;

        let nonce = match self.account.pending_nonce(&endpoint).await {
            Ok(n) => n,
            Err(e) => {
                return Err(self
                    .abort(&endpoint, stage, e, |e| TransferError::Endpoint(e.to_string()))
                    .await)
            }
        };
        let fees = match self.fees.current_fees(&endpoint).await {
            Ok(f) => f,
            Err(e) => {
                return Err(self
                    .abort(&endpoint, stage, e, |e| TransferError::FeeUnavailable(e.to_string()))
                    .await)
            }
        };
        stage = TransferStage::FeesFetched;

        let signed = self
            .assembler
            .assemble(
                self.account.signer(),
                destination,
                clamped.amount,
                nonce,
                fees,
                endpoint.chain_id(),
            )
            .map_err(|e| self.fail(stage, TransferError::SigningError(e.to_string())))?;
        stage = TransferStage::Assembled;

        tracing::info!(
            to = %destination,
            amount = %clamped.amount,
            nonce,
            max_fee_per_gas = fees.max_fee_per_gas,
            max_priority_fee_per_gas = fees.max_priority_fee_per_gas,
            max_fee_cost = %fees.max_cost(TRANSFER_GAS_LIMIT),
            "Submitting EIP-1559 transfer"
        );

        let tx_hash = match self.broadcaster.submit(&endpoint, &signed).await {
            Ok(h) => h,
            Err(e) => {
                let local_hash = signed.tx_hash();
                return Err(self
                    .abort(&endpoint, stage, e, |e| match e {
                        BlockchainError::Rejected(message) => TransferError::BroadcastError(message),
                        // The node may have taken it before the connection broke.
                        e if e.is_endpoint_failure() => TransferError::SubmissionUnknown {
                            tx_hash: local_hash,
                            reason: e.to_string(),
                        },
                        other => TransferError::BroadcastError(other.to_string()),
                    })
                    .await)
            }
        };
        stage = TransferStage::Broadcast;
        // The pending nonce now reflects this transaction; let the next call in.
        drop(guard);

        let confirmation = self
            .broadcaster
            .wait_for_confirmation(&endpoint, tx_hash)
            .await
            .map_err(|e| {
                let err = match e {
                    BlockchainError::ConfirmationTimeout {
                        tx_hash,
                        waited_secs,
                    } => TransferError::ConfirmationTimeout {
                        tx_hash,
                        waited_secs,
                    },
                    BlockchainError::Reverted {
                        tx_hash,
                        block_number,
                    } => TransferError::Reverted {
                        tx_hash,
                        block_number,
                    },
                    other => TransferError::BroadcastError(other.to_string()),
                };
                self.fail(stage, err)
            })?;

        let transfer = signed.transfer();
        Ok(TransferReceipt {
            tx_hash: confirmation.tx_hash,
            from: self.account.address(),
            to: transfer.destination,
            amount: transfer.value,
            requested: clamped.requested,
            nonce: transfer.nonce,
            block_number: confirmation.block_number,
            chain_id: transfer.chain_id,
            max_fee_per_gas: transfer.max_fee_per_gas,
            max_priority_fee_per_gas: transfer.max_priority_fee_per_gas,
        })
    }

    /// Current balance, binding an endpoint if needed.
    pub async fn balance(&self) -> Result<U256, TransferError> {
        let endpoint = self
            .pool
            .ensure_connected()
            .await
            .map_err(TransferError::from_connection)?;

        match self.account.balance(&endpoint).await {
            Ok(b) => Ok(b),
            Err(e) => Err(self
                .abort(&endpoint, TransferStage::ConnectionEnsured, e, |e| {
                    TransferError::Endpoint(e.to_string())
                })
                .await),
        }
    }

    /// Balance through an already bound endpoint, `None` when there is no
    /// binding or the read fails. Never probes.
    pub async fn observed_balance(&self) -> Option<U256> {
        let endpoint = self.pool.current().await?;
        match self.account.balance(&endpoint).await {
            Ok(b) => Some(b),
            Err(e) => {
                tracing::debug!(error = %e, "Observed balance unavailable");
                None
            }
        }
    }

    /// Unbind the endpoint if the error implicates it, then map and log.
    async fn abort(
        &self,
        endpoint: &BoundEndpoint<R>,
        stage: TransferStage,
        err: BlockchainError,
        into: impl FnOnce(BlockchainError) -> TransferError,
    ) -> TransferError {
        if err.is_endpoint_failure() {
            self.pool.invalidate(endpoint).await;
        }
        self.fail(stage, into(err))
    }

    fn fail(&self, stage: TransferStage, err: TransferError) -> TransferError {
        tracing::warn!(
            stage = %stage,
            kind = err.kind(),
            error = %err,
            "Transfer failed"
        );
        err
    }
}
