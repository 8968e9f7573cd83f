//! Transfer request, outcome and error types.

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, TxHash, U256};
use thiserror::Error;

use crate::blockchain::BlockchainError;

/// A transfer as asked for by a caller. Missing fields fall back to the
/// service defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferRequest {
    /// Amount in wei.
    pub amount: Option<U256>,
    pub destination: Option<Address>,
}

impl TransferRequest {
    /// Parse the decimal amount and destination supplied by a caller.
    ///
    /// A zero amount counts as "not given". Malformed or negative amounts and
    /// malformed addresses are rejected.
    pub fn parse(amount: Option<&str>, destination: Option<&str>) -> Result<Self, TransferError> {
        let amount = match amount.map(str::trim).filter(|a| !a.is_empty()) {
            Some(text) if text.starts_with('-') => {
                return Err(TransferError::InvalidRequest(format!(
                    "amount '{}' must not be negative",
                    text
                )));
            }
            Some(text) => {
                let wei = parse_ether(text).map_err(|e| {
                    TransferError::InvalidRequest(format!("invalid amount '{}': {}", text, e))
                })?;
                (!wei.is_zero()).then_some(wei)
            }
            None => None,
        };

        let destination = match destination.map(str::trim).filter(|d| !d.is_empty()) {
            Some(text) => Some(text.parse::<Address>().map_err(|e| {
                TransferError::InvalidRequest(format!("invalid destination '{}': {}", text, e))
            })?),
            None => None,
        };

        Ok(Self {
            amount,
            destination,
        })
    }
}

/// Why a balance could not fund the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortfall {
    /// The balance does not even cover the fee reserve.
    BelowReserve,
    /// Nothing is left once the reserve is withheld.
    NothingAfterReserve,
}

impl Shortfall {
    fn message(&self, reserve: &U256) -> String {
        match self {
            Shortfall::BelowReserve => {
                format!("Need {} ETH for gas", trim_decimal(&format_ether(*reserve)))
            }
            Shortfall::NothingAfterReserve => "Insufficient after gas reserve".to_string(),
        }
    }
}

/// Stages of one transfer, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Idle,
    ConnectionEnsured,
    BalanceChecked,
    FeesFetched,
    Assembled,
    Broadcast,
    Confirmed,
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransferStage::Idle => "idle",
            TransferStage::ConnectionEnsured => "connection_ensured",
            TransferStage::BalanceChecked => "balance_checked",
            TransferStage::FeesFetched => "fees_fetched",
            TransferStage::Assembled => "assembled",
            TransferStage::Broadcast => "broadcast",
            TransferStage::Confirmed => "confirmed",
        };
        f.write_str(name)
    }
}

/// Errors a transfer can end with.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The caller's input could not be interpreted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No signing credential was provided at startup.
    #[error("Wallet not configured")]
    NotConfigured,

    /// Every endpoint failed its liveness probe. Retryable later.
    #[error("No reachable endpoint ({attempted} tried)")]
    NoReachableEndpoint { attempted: usize },

    /// The balance cannot fund the transfer. Client-correctable.
    #[error("{}", .shortfall.message(.reserve))]
    InsufficientFunds {
        shortfall: Shortfall,
        balance: U256,
        reserve: U256,
    },

    /// Reading balance or nonce from the bound endpoint failed.
    #[error("Account read failed: {0}")]
    Endpoint(String),

    #[error("Fee data unavailable: {0}")]
    FeeUnavailable(String),

    /// Signing failed. Indicates misconfiguration; not retryable.
    #[error("Signing failed: {0}")]
    SigningError(String),

    /// The network refused the transaction. Message is the endpoint's, verbatim.
    #[error("{0}")]
    BroadcastError(String),

    /// The submit call failed in transport, so the node may or may not hold
    /// the transaction. The hash is known locally.
    #[error("Transaction {tx_hash} submission outcome unknown: {reason}")]
    SubmissionUnknown { tx_hash: TxHash, reason: String },

    /// Accepted but not confirmed in time. The transaction may still land.
    #[error("Transaction {tx_hash} not confirmed after {waited_secs} seconds")]
    ConfirmationTimeout { tx_hash: TxHash, waited_secs: u64 },

    /// Included, but execution failed.
    #[error("Transaction {tx_hash} reverted in block {block_number}")]
    Reverted { tx_hash: TxHash, block_number: u64 },
}

impl TransferError {
    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::InvalidRequest(_) => "invalid_request",
            TransferError::NotConfigured => "not_configured",
            TransferError::NoReachableEndpoint { .. } => "no_reachable_endpoint",
            TransferError::InsufficientFunds { .. } => "insufficient_funds",
            TransferError::Endpoint(_) => "endpoint_error",
            TransferError::FeeUnavailable(_) => "fee_unavailable",
            TransferError::SigningError(_) => "signing_error",
            TransferError::BroadcastError(_) => "broadcast_error",
            TransferError::SubmissionUnknown { .. } => "submission_unknown",
            TransferError::ConfirmationTimeout { .. } => "confirmation_timeout",
            TransferError::Reverted { .. } => "reverted",
        }
    }

    /// Whether the same call may succeed later without the caller changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::NoReachableEndpoint { .. }
                | TransferError::Endpoint(_)
                | TransferError::FeeUnavailable(_)
        )
    }

    /// Map an error from the endpoint pool.
    pub(crate) fn from_connection(err: BlockchainError) -> Self {
        match err {
            BlockchainError::NoReachableEndpoint { attempted } => {
                TransferError::NoReachableEndpoint { attempted }
            }
            other => TransferError::Endpoint(other.to_string()),
        }
    }
}

/// Outcome of a confirmed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_hash: TxHash,
    pub from: Address,
    pub to: Address,
    /// Amount actually transferred, in wei.
    pub amount: U256,
    /// Amount asked for, in wei. Larger than `amount` when clamped.
    pub requested: U256,
    pub nonce: u64,
    pub block_number: u64,
    pub chain_id: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl TransferReceipt {
    pub fn was_clamped(&self) -> bool {
        self.amount != self.requested
    }
}

/// Format wei as ether, trimming trailing zeros ("0.009", "1").
pub fn format_eth(wei: U256) -> String {
    trim_decimal(&format_ether(wei))
}

/// Format wei as ether truncated to `decimals` places ("0.050000").
pub fn format_eth_fixed(wei: U256, decimals: usize) -> String {
    let full = format_ether(wei);
    let (whole, frac) = full.split_once('.').unwrap_or((full.as_str(), ""));
    if decimals == 0 {
        return whole.to_string();
    }
    let mut frac: String = frac.chars().take(decimals).collect();
    while frac.len() < decimals {
        frac.push('0');
    }
    format!("{}.{}", whole, frac)
}

fn trim_decimal(text: &str) -> String {
    if !text.contains('.') {
        return text.to_string();
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
