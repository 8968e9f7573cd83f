//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Static endpoint list (config)
//!     → pool.rs (first-success binding, chain check)
//!     → rpc.rs (alloy provider, per-call timeout)
//! Environment variable (private key)
//!     → wallet.rs (signing credential)
//!     → account.rs (balance, pending nonce)
//! fees.rs (fee suggestion)
//!     → transaction.rs (build + sign EIP-1559 transfer)
//!     → broadcast.rs (submit, wait for inclusion)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod account;
pub mod broadcast;
pub mod fees;
pub mod pool;
pub mod rpc;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use account::AccountState;
pub use broadcast::Broadcaster;
pub use fees::FeeEstimator;
pub use pool::{BindingState, BoundEndpoint, Endpoint, EndpointPool};
pub use rpc::{AlloyRpc, ChainRpc};
pub use transaction::{SignedTransfer, TransactionAssembler, UnsignedTransfer, TRANSFER_GAS_LIMIT};
pub use types::{BlockchainError, BlockchainResult, Confirmation, FeeParameters, ReceiptSummary};
pub use wallet::Wallet;
