// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(missing_docs)]

//! # Dataworker Clients Crate 🕸️
//!
//! The read-only client interfaces the dataworker consumes. The event
//! indexers behind these traits are external collaborators; the dataworker
//! only requires that a client is `updated` (holding a consistent snapshot)
//! before a cycle reads through it. The `mock` module ships deterministic
//! in-memory backends for tests.

/// Mocked in-memory client backends.
pub mod mock;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dataworker_types::{DepositWithBlock, Fill, FillWithBlock, PendingRootBundle, TokenInfo};
use dataworker_utils::{Error, Result};
use ethers::types::{Address, U256};

/// Read-only view over the HubPool contract and its indexed history.
pub trait HubPoolClient: Send + Sync {
    /// Whether the client holds a consistent snapshot.
    fn is_updated(&self) -> bool;

    /// Whether a root bundle proposal is currently pending.
    fn has_pending_proposal(&self) -> bool;

    /// The pending proposal, if any.
    fn pending_root_bundle(&self) -> Option<PendingRootBundle>;

    /// The HubPool's notion of current time.
    fn current_time(&self) -> u32;

    /// Latest mainnet block the client is synced to.
    fn latest_block_number(&self) -> u64;

    /// The SpokePool address that was canonical for `chain_id` at
    /// `mainnet_block`.
    fn spoke_pool_for_block(&self, mainnet_block: u64, chain_id: u64) -> Result<Address>;

    /// The L2 token `l1_token` maps to on `chain_id`.
    fn destination_token_for_l1_token(&self, l1_token: Address, chain_id: u64) -> Result<Address>;

    /// The L1 counterpart of `l2_token` on `chain_id`, as of `mainnet_block`.
    fn l1_token_counterpart_at_block(
        &self,
        chain_id: u64,
        l2_token: Address,
        mainnet_block: u64,
    ) -> Result<Address>;

    /// One past the last executed bundle's end block for `chain_id`, or 0 if
    /// no bundle was ever executed for it.
    fn next_bundle_start_block(
        &self,
        chain_list: &[u64],
        latest_mainnet_block: u64,
        chain_id: u64,
    ) -> u64;

    /// Static metadata for `token` on `chain_id`.
    fn token_info(&self, chain_id: u64, token: Address) -> Result<TokenInfo>;
}

/// Read-only view over the on-chain configuration store.
pub trait ConfigStoreClient: Send + Sync {
    /// Whether the client holds a consistent snapshot.
    fn is_updated(&self) -> bool;

    /// Maximum refund entries per relayer refund leaf, at `mainnet_block`.
    fn max_refund_count_for_block(&self, mainnet_block: u64) -> u32;

    /// Maximum L1 tokens per pool rebalance leaf, at `mainnet_block`.
    fn max_l1_token_count_for_block(&self, mainnet_block: u64) -> u32;

    /// The transfer threshold for `l1_token`, at `mainnet_block`. Running
    /// balances below the threshold are carried instead of moved.
    fn token_transfer_threshold_for_block(&self, l1_token: Address, mainnet_block: u64) -> U256;
}

/// Read-only view over one chain's SpokePool event history.
#[async_trait]
pub trait SpokePoolClient: Send + Sync {
    /// The chain this client indexes.
    fn chain_id(&self) -> u64;

    /// Whether the client holds a consistent snapshot.
    fn is_updated(&self) -> bool;

    /// Refreshes the client's snapshot from the chain.
    async fn update(&self) -> Result<()>;

    /// Every fill recorded on this chain whose deposit originated on
    /// `origin_chain_id`, in indexing order.
    fn fills_with_block_for_origin_chain(&self, origin_chain_id: u64) -> Vec<FillWithBlock>;

    /// The deposit `fill` executes against, looked up over the client's full
    /// history, or `None` for a fill that matches nothing.
    fn deposit_for_fill(&self, fill: &Fill) -> Option<DepositWithBlock>;

    /// Every deposit recorded on this chain destined for
    /// `destination_chain_id`, in indexing order.
    fn deposits_for_destination_chain(&self, destination_chain_id: u64) -> Vec<DepositWithBlock>;
}

/// Constructs read-only SpokePool clients pinned at a historical deployment.
pub trait SpokePoolClientFactory: Send + Sync {
    /// A client for the SpokePool deployed at `address` on `chain_id`.
    fn for_deployment(&self, chain_id: u64, address: Address) -> Result<Arc<dyn SpokePoolClient>>;
}

/// A minimal chain RPC handle.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// The chain this provider talks to.
    fn chain_id(&self) -> u64;

    /// The chain's current head block number.
    async fn get_block_number(&self) -> Result<u64>;
}

/// The full set of read-only clients one dataworker cycle consumes.
#[derive(Clone)]
pub struct Clients {
    /// The HubPool client.
    pub hub_pool: Arc<dyn HubPoolClient>,
    /// The configuration store client.
    pub config_store: Arc<dyn ConfigStoreClient>,
    /// Factory for per-chain SpokePool clients at historical deployments.
    pub spoke_pool_factory: Arc<dyn SpokePoolClientFactory>,
    /// One RPC provider per chain in the evaluation order.
    pub providers: HashMap<u64, Arc<dyn ChainProvider>>,
}

impl Clients {
    /// The provider for `chain_id`.
    pub fn provider(&self, chain_id: u64) -> Result<&Arc<dyn ChainProvider>> {
        self.providers.get(&chain_id).ok_or(Error::ChainNotFound { chain_id })
    }
}
