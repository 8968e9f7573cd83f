//! Single-account ETH transfer relay.

pub mod blockchain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod transfer;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use transfer::{TransferError, TransferReceipt, TransferRequest, TransferService};
