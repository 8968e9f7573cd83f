//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that amounts and the fallback destination are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use alloy::primitives::utils::parse_ether;
use alloy::primitives::Address;

use crate::config::schema::RelayConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.network.endpoints.is_empty() {
        errors.push(ValidationError::new(
            "network.endpoints",
            "at least one endpoint is required",
        ));
    }
    for endpoint in &config.network.endpoints {
        if url::Url::parse(endpoint).is_err() {
            errors.push(ValidationError::new(
                "network.endpoints",
                format!("'{}' is not a valid URL", endpoint),
            ));
        }
    }
    if config.network.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("network.rpc_timeout_secs", "must be > 0"));
    }

    let transfer = &config.transfer;
    for (field, value) in [
        ("transfer.default_amount", &transfer.default_amount),
        ("transfer.reserve", &transfer.reserve),
    ] {
        if value.trim_start().starts_with('-') {
            errors.push(ValidationError::new(field, "must not be negative"));
        }
    }
    match parse_ether(&transfer.default_amount) {
        Ok(amount) if amount.is_zero() => {
            errors.push(ValidationError::new("transfer.default_amount", "must be > 0"));
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new(
            "transfer.default_amount",
            format!("'{}' is not a decimal amount: {}", transfer.default_amount, e),
        )),
    }
    if let Err(e) = parse_ether(&transfer.reserve) {
        errors.push(ValidationError::new(
            "transfer.reserve",
            format!("'{}' is not a decimal amount: {}", transfer.reserve, e),
        ));
    }
    if transfer.fallback_destination.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "transfer.fallback_destination",
            format!("'{}' is not an address", transfer.fallback_destination),
        ));
    }
    if transfer.confirmation_blocks == 0 {
        errors.push(ValidationError::new("transfer.confirmation_blocks", "must be > 0"));
    }
    if transfer.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "transfer.confirmation_timeout_secs",
            "must be > 0",
        ));
    }
    if transfer.confirmation_poll_ms == 0 {
        errors.push(ValidationError::new("transfer.confirmation_poll_ms", "must be > 0"));
    }

    let worst_case = worst_case_transfer_secs(config);
    if config.listener.request_timeout_secs <= worst_case {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            format!(
                "must exceed {}s: transfer.confirmation_timeout_secs plus \
                 (2 x endpoints + 4) x network.rpc_timeout_secs",
                worst_case
            ),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Longest a transfer can run before it returns on its own: a probe sweep
/// of two calls per endpoint, four account, fee and submit calls, then the
/// confirmation wait.
pub fn worst_case_transfer_secs(config: &RelayConfig) -> u64 {
    let calls = (config.network.endpoints.len() as u64)
        .saturating_mul(2)
        .saturating_add(4);
    calls
        .saturating_mul(config.network.rpc_timeout_secs)
        .saturating_add(config.transfer.confirmation_timeout_secs)
}
