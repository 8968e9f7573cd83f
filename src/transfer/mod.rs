//! Transfer pipeline.
//!
//! # Data Flow
//! ```text
//! TransferRequest (amount?, destination?)
//!     → service.rs (stage machine, single-writer submission lock)
//!     → clamp.rs (reserve check, min(requested, balance - reserve))
//!     → blockchain::* (balance, nonce, fees, sign, broadcast, confirm)
//!     → TransferReceipt | TransferError
//! ```

pub mod clamp;
pub mod service;
pub mod types;

pub use clamp::{AmountClamper, Clamped};
pub use service::{TransferService, TransferSettings};
pub use types::{
    format_eth, format_eth_fixed, Shortfall, TransferError, TransferReceipt, TransferRequest,
    TransferStage,
};
