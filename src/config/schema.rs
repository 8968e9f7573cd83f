//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.
//! The signing credential is deliberately absent: it is read from the
//! environment only (see `blockchain::wallet`).

use serde::{Deserialize, Serialize};

/// Fallback destination used when a transfer request names none.
pub const DEFAULT_FALLBACK_DESTINATION: &str = "0x4024Fd78E2AD5532FBF3ec2B3eC83870FAe45fC7";

/// Root configuration for the transfer relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Network endpoints and chain identity.
    pub network: NetworkConfig,

    /// Transfer policy (amounts, reserve, confirmation).
    pub transfer: TransferConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Total time allowed for one HTTP request, including the confirmation wait.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 300,
        }
    }
}

/// Network endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoints in priority order. The first one to pass the
    /// liveness probe is bound for the session.
    pub endpoints: Vec<String>,

    /// Expected chain ID (1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// Per-call RPC timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "https://ethereum-rpc.publicnode.com".to_string(),
                "https://eth.drpc.org".to_string(),
                "https://rpc.ankr.com/eth".to_string(),
                "https://eth.llamarpc.com".to_string(),
            ],
            chain_id: 1,
            rpc_timeout_secs: 10,
        }
    }
}

/// Transfer policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Amount sent when the request omits one, in ether.
    pub default_amount: String,

    /// Balance withheld from every transfer to cover fees, in ether.
    pub reserve: String,

    /// Destination used when the request omits one.
    pub fallback_destination: String,

    /// Blocks of inclusion required before a transfer counts as confirmed.
    pub confirmation_blocks: u32,

    /// Maximum time to wait for confirmation in seconds.
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub confirmation_poll_ms: u64,

    /// Serialize the read-nonce-to-broadcast sequence across concurrent calls.
    pub serialize_submissions: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            default_amount: "0.01".to_string(),
            reserve: "0.002".to_string(),
            fallback_destination: DEFAULT_FALLBACK_DESTINATION.to_string(),
            confirmation_blocks: 1,
            confirmation_timeout_secs: 120,
            confirmation_poll_ms: 2000,
            serialize_submissions: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
