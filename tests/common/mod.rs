//! Shared utilities for integration tests: an in-memory ledger and
//! `ChainRpc` endpoints backed by it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use transfer_relay::blockchain::{
    AccountState, BlockchainError, BlockchainResult, Broadcaster, ChainRpc, Endpoint,
    EndpointPool, FeeParameters, ReceiptSummary, Wallet,
};
use transfer_relay::config::schema::DEFAULT_FALLBACK_DESTINATION;
use transfer_relay::http::HttpServer;
use transfer_relay::transfer::{TransferService, TransferSettings};
use transfer_relay::RelayConfig;

/// Anvil's first development key.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn eth(text: &str) -> U256 {
    parse_ether(text).unwrap()
}

pub fn fallback_destination() -> Address {
    DEFAULT_FALLBACK_DESTINATION.parse().unwrap()
}

/// A transaction the ledger accepted.
#[derive(Debug, Clone)]
pub struct SubmittedTx {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub nonce: u64,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

struct LedgerState {
    block_number: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, ReceiptSummary>,
    pending: Vec<TxHash>,
    submitted: Vec<SubmittedTx>,
    fees: FeeParameters,
    auto_mine: bool,
    reject_next: Option<String>,
    revert_next: bool,
    lose_next_reply: bool,
}

/// Chain state shared by every mock endpoint.
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Ledger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LedgerState {
                block_number: 100,
                balances: HashMap::new(),
                nonces: HashMap::new(),
                receipts: HashMap::new(),
                pending: Vec::new(),
                submitted: Vec::new(),
                fees: FeeParameters {
                    max_fee_per_gas: 30_000_000_000,
                    max_priority_fee_per_gas: 1_000_000_000,
                },
                auto_mine: true,
                reject_next: None,
                revert_next: false,
                lose_next_reply: false,
            }),
        })
    }

    pub fn fund(&self, address: Address, amount: U256) {
        self.state.lock().unwrap().balances.insert(address, amount);
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn set_auto_mine(&self, enabled: bool) {
        self.state.lock().unwrap().auto_mine = enabled;
    }

    /// Include every pending transaction in one new block.
    pub fn mine_pending(&self) {
        let mut state = self.state.lock().unwrap();
        state.block_number += 1;
        let block_number = state.block_number;
        let pending = std::mem::take(&mut state.pending);
        for hash in pending {
            state.receipts.insert(
                hash,
                ReceiptSummary {
                    block_number,
                    success: true,
                },
            );
        }
    }

    /// Make the next submission fail with a node error carrying `message`.
    pub fn reject_next(&self, message: &str) {
        self.state.lock().unwrap().reject_next = Some(message.to_string());
    }

    pub fn revert_next(&self) {
        self.state.lock().unwrap().revert_next = true;
    }

    /// Accept the next submission but answer the sender with a timeout.
    pub fn lose_next_reply(&self) {
        self.state.lock().unwrap().lose_next_reply = true;
    }

    fn accept(&self, raw: &Bytes) -> BlockchainResult<TxHash> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| BlockchainError::Rejected(format!("invalid transaction: {}", e)))?;
        let signed = envelope
            .as_eip1559()
            .ok_or_else(|| BlockchainError::Rejected("unsupported transaction type".into()))?;
        let from = signed
            .signature()
            .recover_address_from_prehash(&signed.signature_hash())
            .map_err(|e| BlockchainError::Rejected(format!("invalid signature: {}", e)))?;
        let tx = signed.tx();

        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.reject_next.take() {
            return Err(BlockchainError::Rejected(message));
        }

        let expected_nonce = state.nonces.get(&from).copied().unwrap_or_default();
        if tx.nonce < expected_nonce {
            return Err(BlockchainError::Rejected("nonce too low".into()));
        }
        if tx.nonce > expected_nonce {
            return Err(BlockchainError::Rejected("nonce too high".into()));
        }

        let gas_cost = U256::from(tx.max_fee_per_gas) * U256::from(tx.gas_limit);
        let balance = state.balances.get(&from).copied().unwrap_or_default();
        if balance < tx.value + gas_cost {
            return Err(BlockchainError::Rejected(
                "insufficient funds for gas * price + value".into(),
            ));
        }

        let to = tx.to.to().copied().unwrap_or_default();
        let hash = *signed.hash();
        state.balances.insert(from, balance - tx.value - gas_cost);
        *state.balances.entry(to).or_default() += tx.value;
        state.nonces.insert(from, expected_nonce + 1);
        state.submitted.push(SubmittedTx {
            hash,
            from,
            to,
            value: tx.value,
            nonce: tx.nonce,
            gas_limit: tx.gas_limit,
            chain_id: tx.chain_id,
            max_fee_per_gas: tx.max_fee_per_gas,
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        });

        if state.auto_mine {
            state.block_number += 1;
            let success = !std::mem::take(&mut state.revert_next);
            let block_number = state.block_number;
            state.receipts.insert(
                hash,
                ReceiptSummary {
                    block_number,
                    success,
                },
            );
        } else {
            state.pending.push(hash);
        }

        if std::mem::take(&mut state.lose_next_reply) {
            return Err(BlockchainError::Timeout(10));
        }
        Ok(hash)
    }
}

/// Knobs for one mock endpoint, kept after the endpoint moves into a pool.
pub struct EndpointControl {
    reachable: AtomicBool,
    chain_id: u64,
    latency: Duration,
    probes: AtomicUsize,
    submissions: AtomicUsize,
    fail_fees_next: AtomicBool,
}

impl EndpointControl {
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Liveness probes (`block_number` calls) seen.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Make the next fee suggestion fail in transport.
    pub fn fail_fees_next(&self) {
        self.fail_fees_next.store(true, Ordering::SeqCst);
    }
}

/// `ChainRpc` over the shared ledger.
pub struct MockRpc {
    ledger: Arc<Ledger>,
    control: Arc<EndpointControl>,
}

impl MockRpc {
    async fn enter(&self) -> BlockchainResult<()> {
        if !self.control.latency.is_zero() {
            tokio::time::sleep(self.control.latency).await;
        }
        if self.control.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BlockchainError::Rpc("connection refused".into()))
        }
    }
}

impl ChainRpc for MockRpc {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        self.enter().await?;
        Ok(self.control.chain_id)
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.control.probes.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        Ok(self.ledger.state.lock().unwrap().block_number)
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.enter().await?;
        Ok(self.ledger.balance_of(address))
    }

    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.enter().await?;
        let state = self.ledger.state.lock().unwrap();
        Ok(state.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn fee_suggestion(&self) -> BlockchainResult<FeeParameters> {
        self.enter().await?;
        if self.control.fail_fees_next.swap(false, Ordering::SeqCst) {
            return Err(BlockchainError::Rpc("eth_feeHistory: connection reset".into()));
        }
        Ok(self.ledger.state.lock().unwrap().fees)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.enter().await?;
        self.control.submissions.fetch_add(1, Ordering::SeqCst);
        self.ledger.accept(&raw)
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        self.enter().await?;
        Ok(self.ledger.state.lock().unwrap().receipts.get(&tx_hash).copied())
    }
}

/// How a mock endpoint starts out.
#[derive(Debug, Clone, Copy)]
pub struct EndpointSetup {
    pub chain_id: u64,
    pub reachable: bool,
    pub latency: Duration,
}

impl EndpointSetup {
    pub fn up() -> Self {
        Self {
            chain_id: 1,
            reachable: true,
            latency: Duration::ZERO,
        }
    }

    pub fn down() -> Self {
        Self {
            reachable: false,
            ..Self::up()
        }
    }

    pub fn on_chain(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Self::up()
        }
    }

    pub fn slow(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::up()
        }
    }
}

pub fn default_settings() -> TransferSettings {
    TransferSettings {
        default_amount: eth("0.01"),
        reserve: eth("0.002"),
        fallback_destination: fallback_destination(),
        serialize_submissions: true,
    }
}

pub fn fast_broadcaster() -> Broadcaster {
    Broadcaster::new(1, Duration::from_secs(2), Duration::from_millis(10))
}

/// A relay wired to mock endpoints.
pub struct Harness {
    pub ledger: Arc<Ledger>,
    pub controls: Vec<Arc<EndpointControl>>,
    pub pool: Arc<EndpointPool<MockRpc>>,
    pub service: Arc<TransferService<MockRpc>>,
    pub wallet: Address,
}

impl Harness {
    /// One healthy mainnet endpoint and an account holding `balance` ETH.
    pub fn funded(balance: &str) -> Self {
        Self::build(
            balance,
            &[EndpointSetup::up()],
            default_settings(),
            fast_broadcaster(),
        )
    }

    pub fn with_endpoints(balance: &str, setups: &[EndpointSetup]) -> Self {
        Self::build(balance, setups, default_settings(), fast_broadcaster())
    }

    pub fn build(
        balance: &str,
        setups: &[EndpointSetup],
        settings: TransferSettings,
        broadcaster: Broadcaster,
    ) -> Self {
        let ledger = Ledger::new();
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY).unwrap();
        ledger.fund(wallet.address(), eth(balance));

        let mut controls = Vec::new();
        let mut endpoints = Vec::new();
        for (i, setup) in setups.iter().enumerate() {
            let control = Arc::new(EndpointControl {
                reachable: AtomicBool::new(setup.reachable),
                chain_id: setup.chain_id,
                latency: setup.latency,
                probes: AtomicUsize::new(0),
                submissions: AtomicUsize::new(0),
                fail_fees_next: AtomicBool::new(false),
            });
            endpoints.push(Endpoint::new(
                format!("http://mock-{}.invalid", i),
                MockRpc {
                    ledger: ledger.clone(),
                    control: control.clone(),
                },
            ));
            controls.push(control);
        }

        let pool = Arc::new(EndpointPool::new(endpoints, 1));
        let address = wallet.address();
        let service = Arc::new(TransferService::new(
            pool.clone(),
            AccountState::new(wallet),
            settings,
            broadcaster,
        ));

        Self {
            ledger,
            controls,
            pool,
            service,
            wallet: address,
        }
    }
}

/// Serve `service` on an ephemeral port. Returns the base URL and the
/// shutdown sender keeping the server alive.
pub async fn spawn_relay(
    service: Option<Arc<TransferService<MockRpc>>>,
) -> (String, broadcast::Sender<()>) {
    spawn_relay_with(&RelayConfig::default(), service).await
}

pub async fn spawn_relay_with(
    config: &RelayConfig,
    service: Option<Arc<TransferService<MockRpc>>>,
) -> (String, broadcast::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let (tx, rx) = broadcast::channel(1);

    let server = HttpServer::new(config, service);
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (format!("http://{}", addr), tx)
}
