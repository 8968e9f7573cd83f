//! Signing credential.
//!
//! The key is read once from `TREASURY_PRIVATE_KEY` and only ever leaves this
//! module as signatures. Signing is local; nothing here touches the network.

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};

use crate::blockchain::types::{BlockchainError, BlockchainResult};

pub const PRIVATE_KEY_ENV_VAR: &str = "TREASURY_PRIVATE_KEY";

/// The relay account's key.
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Parse a hex key, `0x` prefix optional.
    pub fn from_private_key(key: &str) -> BlockchainResult<Self> {
        let key = key.trim();
        let hex = key.strip_prefix("0x").unwrap_or(key);

        let signer = hex
            .parse::<PrivateKeySigner>()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(address = %signer.address(), "Signing key loaded");
        Ok(Self { signer })
    }

    /// `Ok(None)` when the variable is unset or blank, so the server can still
    /// answer `/status` without a key.
    pub fn from_env() -> BlockchainResult<Option<Self>> {
        match std::env::var(PRIVATE_KEY_ENV_VAR) {
            Ok(key) if !key.trim().is_empty() => Self::from_private_key(&key).map(Some),
            _ => Ok(None),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn sign_hash(&self, hash: &B256) -> BlockchainResult<Signature> {
        self.signer
            .sign_hash_sync(hash)
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
