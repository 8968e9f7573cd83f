//! Transaction building and signing.
//!
//! # Responsibilities
//! - Build a plain value-transfer EIP-1559 transaction from explicit inputs
//! - Sign it locally and produce the EIP-2718 payload and its hash
//!
//! The nonce is an input. Nothing here reads or advances account state.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxType};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};

use crate::blockchain::types::{BlockchainResult, FeeParameters};
use crate::blockchain::wallet::Wallet;

/// Gas consumed by a plain value transfer with no call data.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Every relay transaction is a priority-fee transaction.
pub const TRANSFER_TX_TYPE: TxType = TxType::Eip1559;

/// A transfer ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransfer {
    pub destination: Address,
    pub value: U256,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub tx_type: TxType,
    pub chain_id: u64,
}

impl UnsignedTransfer {
    fn to_eip1559(&self) -> TxEip1559 {
        TxEip1559 {
            chain_id: self.chain_id,
            nonce: self.nonce,
            gas_limit: self.gas_limit,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            to: TxKind::Call(self.destination),
            value: self.value,
            access_list: Default::default(),
            input: Bytes::new(),
        }
    }
}

/// A signed transfer. Immutable once produced.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    transfer: UnsignedTransfer,
    raw: Bytes,
    tx_hash: TxHash,
}

impl SignedTransfer {
    pub fn transfer(&self) -> &UnsignedTransfer {
        &self.transfer
    }

    /// EIP-2718 encoded payload for `eth_sendRawTransaction`.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }
}

/// Builds and signs transfer transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionAssembler;

impl TransactionAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Describe the transaction for the given inputs. Gas limit and type are fixed.
    pub fn build(
        &self,
        destination: Address,
        value: U256,
        nonce: u64,
        fees: FeeParameters,
        chain_id: u64,
    ) -> UnsignedTransfer {
        UnsignedTransfer {
            destination,
            value,
            nonce,
            gas_limit: TRANSFER_GAS_LIMIT,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            tx_type: TRANSFER_TX_TYPE,
            chain_id,
        }
    }

    /// Sign an unsigned transfer with the relay credential.
    pub fn sign(&self, wallet: &Wallet, transfer: UnsignedTransfer) -> BlockchainResult<SignedTransfer> {
        let tx = transfer.to_eip1559();
        let signature = wallet.sign_hash(&tx.signature_hash())?;
        let signed = tx.into_signed(signature);
        let tx_hash = *signed.hash();
        let raw = Bytes::from(TxEnvelope::from(signed).encoded_2718());

        Ok(SignedTransfer {
            transfer,
            raw,
            tx_hash,
        })
    }

    /// Build and sign in one step.
    pub fn assemble(
        &self,
        wallet: &Wallet,
        destination: Address,
        value: U256,
        nonce: u64,
        fees: FeeParameters,
        chain_id: u64,
    ) -> BlockchainResult<SignedTransfer> {
        let transfer = self.build(destination, value, nonce, fees, chain_id);
        self.sign(wallet, transfer)
    }
}
