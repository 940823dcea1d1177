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

//! Deterministic in-memory client backends for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dataworker_types::{DepositWithBlock, Fill, FillWithBlock, PendingRootBundle, TokenInfo};
use dataworker_utils::{Error, Result};
use ethers::types::{Address, U256};

use crate::{
    ChainProvider, Clients, ConfigStoreClient, HubPoolClient, SpokePoolClient,
    SpokePoolClientFactory,
};

/// In-memory [`HubPoolClient`].
#[derive(Debug, Clone, Default)]
pub struct MockHubPoolClient {
    /// Whether the client reports itself updated.
    pub updated: bool,
    /// The HubPool's notion of current time.
    pub current_time: u32,
    /// Latest synced mainnet block.
    pub latest_block_number: u64,
    /// The pending proposal, if any.
    pub pending_root_bundle: Option<PendingRootBundle>,
    /// SpokePool address per chain (deployment history collapsed to one).
    pub spoke_pools: HashMap<u64, Address>,
    /// `(l1 token, chain) -> l2 token`.
    pub destination_tokens: HashMap<(Address, u64), Address>,
    /// `(chain, l2 token) -> l1 token`.
    pub l1_counterparts: HashMap<(u64, Address), Address>,
    /// Next bundle start block per chain.
    pub next_bundle_start_blocks: HashMap<u64, u64>,
    /// Token metadata per `(chain, token)`.
    pub token_infos: HashMap<(u64, Address), TokenInfo>,
}

impl MockHubPoolClient {
    /// A fresh, updated client with nothing configured.
    pub fn new() -> Self {
        Self { updated: true, ..Default::default() }
    }

    /// Registers `l1_token <-> l2_token` for `chain_id`, in both directions.
    pub fn set_token_mapping(&mut self, l1_token: Address, chain_id: u64, l2_token: Address) {
        self.destination_tokens.insert((l1_token, chain_id), l2_token);
        self.l1_counterparts.insert((chain_id, l2_token), l1_token);
    }

    /// Registers the SpokePool address for `chain_id`.
    pub fn set_spoke_pool(&mut self, chain_id: u64, address: Address) {
        self.spoke_pools.insert(chain_id, address);
    }
}

impl HubPoolClient for MockHubPoolClient {
    fn is_updated(&self) -> bool {
        self.updated
    }

    fn has_pending_proposal(&self) -> bool {
        self.pending_root_bundle.is_some()
    }

    fn pending_root_bundle(&self) -> Option<PendingRootBundle> {
        self.pending_root_bundle.clone()
    }

    fn current_time(&self) -> u32 {
        self.current_time
    }

    fn latest_block_number(&self) -> u64 {
        self.latest_block_number
    }

    fn spoke_pool_for_block(&self, mainnet_block: u64, chain_id: u64) -> Result<Address> {
        self.spoke_pools
            .get(&chain_id)
            .copied()
            .ok_or(Error::SpokePoolNotFound { chain_id, block: mainnet_block })
    }

    fn destination_token_for_l1_token(&self, l1_token: Address, chain_id: u64) -> Result<Address> {
        self.destination_tokens
            .get(&(l1_token, chain_id))
            .copied()
            .ok_or(Error::TokenMappingNotFound { chain_id, token: l1_token })
    }

    fn l1_token_counterpart_at_block(
        &self,
        chain_id: u64,
        l2_token: Address,
        _mainnet_block: u64,
    ) -> Result<Address> {
        self.l1_counterparts
            .get(&(chain_id, l2_token))
            .copied()
            .ok_or(Error::TokenMappingNotFound { chain_id, token: l2_token })
    }

    fn next_bundle_start_block(
        &self,
        _chain_list: &[u64],
        _latest_mainnet_block: u64,
        chain_id: u64,
    ) -> u64 {
        self.next_bundle_start_blocks.get(&chain_id).copied().unwrap_or(0)
    }

    fn token_info(&self, chain_id: u64, token: Address) -> Result<TokenInfo> {
        self.token_infos
            .get(&(chain_id, token))
            .cloned()
            .ok_or(Error::TokenMappingNotFound { chain_id, token })
    }
}

/// In-memory [`ConfigStoreClient`].
#[derive(Debug, Clone)]
pub struct MockConfigStoreClient {
    /// Whether the client reports itself updated.
    pub updated: bool,
    /// Refund entries allowed per relayer refund leaf.
    pub max_refund_count: u32,
    /// L1 tokens allowed per pool rebalance leaf.
    pub max_l1_token_count: u32,
    /// Per-token transfer thresholds.
    pub transfer_thresholds: HashMap<Address, U256>,
    /// Threshold applied to tokens without a dedicated entry.
    pub default_transfer_threshold: U256,
}

impl Default for MockConfigStoreClient {
    fn default() -> Self {
        Self {
            updated: true,
            max_refund_count: 25,
            max_l1_token_count: 100,
            transfer_thresholds: HashMap::new(),
            default_transfer_threshold: U256::zero(),
        }
    }
}

impl ConfigStoreClient for MockConfigStoreClient {
    fn is_updated(&self) -> bool {
        self.updated
    }

    fn max_refund_count_for_block(&self, _mainnet_block: u64) -> u32 {
        self.max_refund_count
    }

    fn max_l1_token_count_for_block(&self, _mainnet_block: u64) -> u32 {
        self.max_l1_token_count
    }

    fn token_transfer_threshold_for_block(&self, l1_token: Address, _mainnet_block: u64) -> U256 {
        self.transfer_thresholds
            .get(&l1_token)
            .copied()
            .unwrap_or(self.default_transfer_threshold)
    }
}

/// In-memory [`SpokePoolClient`] over preloaded deposits and fills.
#[derive(Debug, Default)]
pub struct MockSpokePoolClient {
    chain_id: u64,
    updated: AtomicBool,
    deposits: Vec<DepositWithBlock>,
    fills: Vec<FillWithBlock>,
}

impl MockSpokePoolClient {
    /// A client for `chain_id` that still requires an `update()` call.
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id, ..Default::default() }
    }

    /// Preloads a deposit event.
    pub fn push_deposit(&mut self, deposit: DepositWithBlock) {
        self.deposits.push(deposit);
    }

    /// Preloads a fill event.
    pub fn push_fill(&mut self, fill: FillWithBlock) {
        self.fills.push(fill);
    }

    /// Marks the snapshot updated without going through `update()`.
    pub fn mark_updated(&self) {
        self.updated.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpokePoolClient for MockSpokePoolClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn is_updated(&self) -> bool {
        self.updated.load(Ordering::SeqCst)
    }

    async fn update(&self) -> Result<()> {
        self.updated.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn fills_with_block_for_origin_chain(&self, origin_chain_id: u64) -> Vec<FillWithBlock> {
        self.fills
            .iter()
            .filter(|fill| fill.origin_chain_id == origin_chain_id)
            .cloned()
            .collect()
    }

    fn deposit_for_fill(&self, fill: &Fill) -> Option<DepositWithBlock> {
        self.deposits
            .iter()
            .find(|deposit| {
                deposit.deposit_id == fill.deposit_id
                    && deposit.origin_chain_id == fill.origin_chain_id
                    && fill.matches_deposit(deposit)
            })
            .cloned()
    }

    fn deposits_for_destination_chain(&self, destination_chain_id: u64) -> Vec<DepositWithBlock> {
        self.deposits
            .iter()
            .filter(|deposit| deposit.destination_chain_id == destination_chain_id)
            .cloned()
            .collect()
    }
}

/// Factory handing out preregistered [`MockSpokePoolClient`]s.
#[derive(Default)]
pub struct MockSpokePoolClientFactory {
    clients: HashMap<u64, Arc<MockSpokePoolClient>>,
}

impl MockSpokePoolClientFactory {
    /// An empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the client to hand out for its chain.
    pub fn register(&mut self, client: Arc<MockSpokePoolClient>) {
        self.clients.insert(client.chain_id(), client);
    }
}

impl SpokePoolClientFactory for MockSpokePoolClientFactory {
    fn for_deployment(&self, chain_id: u64, _address: Address) -> Result<Arc<dyn SpokePoolClient>> {
        self.clients
            .get(&chain_id)
            .cloned()
            .map(|client| client as Arc<dyn SpokePoolClient>)
            .ok_or(Error::SpokePoolClientNotFound { chain_id })
    }
}

/// In-memory [`ChainProvider`] with a fixed head, or a scripted failure.
#[derive(Debug, Clone)]
pub struct MockChainProvider {
    chain_id: u64,
    block_number: u64,
    failing: bool,
}

impl MockChainProvider {
    /// A provider reporting `block_number` as the head of `chain_id`.
    pub fn new(chain_id: u64, block_number: u64) -> Self {
        Self { chain_id, block_number, failing: false }
    }

    /// A provider whose `get_block_number` always fails.
    pub fn failing(chain_id: u64) -> Self {
        Self { chain_id, block_number: 0, failing: true }
    }
}

#[async_trait]
impl ChainProvider for MockChainProvider {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_block_number(&self) -> Result<u64> {
        if self.failing {
            return Err(Error::Provider(format!(
                "mock provider for chain {} is scripted to fail",
                self.chain_id
            )));
        }
        Ok(self.block_number)
    }
}

/// Bundles mocks into a [`Clients`] set.
pub fn clients_from_mocks(
    hub_pool: MockHubPoolClient,
    config_store: MockConfigStoreClient,
    factory: MockSpokePoolClientFactory,
    providers: Vec<MockChainProvider>,
) -> Clients {
    Clients {
        hub_pool: Arc::new(hub_pool),
        config_store: Arc::new(config_store),
        spoke_pool_factory: Arc::new(factory),
        providers: providers
            .into_iter()
            .map(|provider| {
                (provider.chain_id(), Arc::new(provider) as Arc<dyn ChainProvider>)
            })
            .collect(),
    }
}
