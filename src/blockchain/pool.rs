//! Endpoint pool with first-success binding.
//!
//! # Responsibilities
//! - Hold the static, priority-ordered endpoint list
//! - Bind the first endpoint that passes the liveness probe on the expected chain
//! - Unbind lazily when an operation against the bound endpoint fails
//!
//! # Design Decisions
//! - No background health monitoring; failure is detected by the next caller
//! - Sweeps are serialized by their own async mutex so concurrent first calls
//!   probe once; the binding state sits behind a separate, briefly held lock so
//!   readers of the current binding never wait on a sweep
//! - State machine: `Unbound → Bound(i) → Unbound`, `Unbound → Failed → (probe again)`

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::blockchain::rpc::{AlloyRpc, ChainRpc};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::config::NetworkConfig;
use crate::observability::metrics;

/// One configured endpoint.
pub struct Endpoint<R> {
    url: String,
    rpc: Arc<R>,
}

impl<R> Endpoint<R> {
    pub fn new(url: impl Into<String>, rpc: R) -> Self {
        Self {
            url: url.into(),
            rpc: Arc::new(rpc),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Handle to the endpoint the pool is currently bound to.
pub struct BoundEndpoint<R> {
    index: usize,
    url: String,
    rpc: Arc<R>,
    chain_id: u64,
}

impl<R> BoundEndpoint<R> {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// Chain ID verified during the probe.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

impl<R> Clone for BoundEndpoint<R> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            url: self.url.clone(),
            rpc: self.rpc.clone(),
            chain_id: self.chain_id,
        }
    }
}

impl<R> std::fmt::Debug for BoundEndpoint<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundEndpoint")
            .field("url", &self.url)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

/// Binding state of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Nothing bound yet, or the previous binding was invalidated.
    Unbound,
    /// Bound to the endpoint at this index.
    Bound(usize),
    /// The last probe sweep found no usable endpoint.
    Failed,
}

/// Ordered set of candidate endpoints with at most one live binding.
pub struct EndpointPool<R> {
    endpoints: Vec<Endpoint<R>>,
    expected_chain_id: u64,
    state: Mutex<BindingState>,
    sweep: Mutex<()>,
}

impl EndpointPool<AlloyRpc> {
    /// Build a pool of alloy HTTP clients from configuration.
    ///
    /// Unparsable URLs are skipped with a warning; the pool may end up empty,
    /// in which case every `ensure_connected` fails.
    pub fn from_config(config: &NetworkConfig) -> Self {
        let endpoints = config
            .endpoints
            .iter()
            .filter_map(|url| match AlloyRpc::connect(url, config.rpc_timeout_secs) {
                Ok(rpc) => Some(Endpoint::new(url.clone(), rpc)),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Ignoring invalid endpoint");
                    None
                }
            })
            .collect();

        Self::new(endpoints, config.chain_id)
    }
}

impl<R: ChainRpc> EndpointPool<R> {
    pub fn new(endpoints: Vec<Endpoint<R>>, expected_chain_id: u64) -> Self {
        Self {
            endpoints,
            expected_chain_id,
            state: Mutex::new(BindingState::Unbound),
            sweep: Mutex::new(()),
        }
    }

    /// Return the bound endpoint, probing the list in priority order if
    /// nothing is bound.
    pub async fn ensure_connected(&self) -> BlockchainResult<BoundEndpoint<R>> {
        if let Some(bound) = self.current().await {
            return Ok(bound);
        }

        let _sweep = self.sweep.lock().await;
        // Another caller may have bound while we waited for the sweep.
        if let Some(bound) = self.current().await {
            return Ok(bound);
        }

        for (index, endpoint) in self.endpoints.iter().enumerate() {
            match self.probe(endpoint).await {
                Ok(chain_id) => {
                    *self.state.lock().await = BindingState::Bound(index);
                    metrics::record_endpoint_bound(&endpoint.url);
                    tracing::info!(endpoint = %endpoint.url, chain_id, "Endpoint bound");
                    return Ok(self.handle(index, chain_id));
                }
                Err(e) => {
                    metrics::record_endpoint_probe_failure(&endpoint.url);
                    tracing::warn!(
                        endpoint = %endpoint.url,
                        error = %e,
                        "Endpoint probe failed, trying next"
                    );
                }
            }
        }

        *self.state.lock().await = BindingState::Failed;
        tracing::error!(attempted = self.endpoints.len(), "No reachable endpoint");
        Err(BlockchainError::NoReachableEndpoint {
            attempted: self.endpoints.len(),
        })
    }

    /// The bound endpoint, without probing or waiting on a sweep in progress.
    pub async fn current(&self) -> Option<BoundEndpoint<R>> {
        match *self.state.lock().await {
            BindingState::Bound(index) => Some(self.handle(index, self.expected_chain_id)),
            _ => None,
        }
    }

    /// Drop the binding to `endpoint` after an operation against it failed.
    /// A no-op when the pool has already moved on.
    pub async fn invalidate(&self, endpoint: &BoundEndpoint<R>) {
        let mut state = self.state.lock().await;
        if *state == BindingState::Bound(endpoint.index) {
            *state = BindingState::Unbound;
            tracing::warn!(endpoint = %endpoint.url, "Endpoint unbound after failure");
        }
    }

    pub async fn state(&self) -> BindingState {
        *self.state.lock().await
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.expected_chain_id
    }

    async fn probe(&self, endpoint: &Endpoint<R>) -> BlockchainResult<u64> {
        let height = endpoint.rpc.block_number().await?;
        let chain_id = endpoint.rpc.chain_id().await?;
        if chain_id != self.expected_chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.expected_chain_id,
                actual: chain_id,
            });
        }
        tracing::debug!(endpoint = %endpoint.url, height, "Endpoint probe succeeded");
        Ok(chain_id)
    }

    fn handle(&self, index: usize, chain_id: u64) -> BoundEndpoint<R> {
        let endpoint = &self.endpoints[index];
        BoundEndpoint {
            index,
            url: endpoint.url.clone(),
            rpc: endpoint.rpc.clone(),
            chain_id,
        }
    }
}
