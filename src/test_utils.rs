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

//! Shared fixtures for the module tests: a two-chain world with one token
//! pair, mirroring the smallest realistic bundle.

use std::collections::HashMap;
use std::sync::Arc;

use dataworker_clients::mock::{
    MockChainProvider, MockConfigStoreClient, MockHubPoolClient, MockSpokePoolClient,
    MockSpokePoolClientFactory,
};
use dataworker_clients::{Clients, SpokePoolClient};
use dataworker_config::DataworkerConfig;
use dataworker_types::{BlockRange, Deposit, DepositWithBlock, Fill, FillWithBlock, TokenInfo};
use ethers::types::{Address, I256, U256};

pub const ORIGIN_CHAIN: u64 = 1;
pub const DESTINATION_CHAIN: u64 = 10;

pub fn amount(value: u64) -> U256 {
    U256::from(value)
}

pub fn signed(value: i64) -> I256 {
    I256::from(value)
}

pub fn relayer() -> Address {
    Address::repeat_byte(0xE1)
}

/// One percent at the 1e18 fixed-point scale.
pub fn one_percent() -> I256 {
    I256::exp10(16)
}

pub struct TwoChainFixture {
    pub config: DataworkerConfig,
    pub l1_token: Address,
    pub l2_token: Address,
}

impl TwoChainFixture {
    pub fn new() -> Self {
        Self {
            config: DataworkerConfig {
                chain_id_list: vec![ORIGIN_CHAIN, DESTINATION_CHAIN],
                ..Default::default()
            },
            l1_token: Address::repeat_byte(0xA1),
            l2_token: Address::repeat_byte(0xB2),
        }
    }

    /// Block ranges `[[100, 200], [500, 600]]` in evaluation order.
    pub fn ranges(&self) -> Vec<BlockRange> {
        vec![BlockRange::new(100, 200), BlockRange::new(500, 600)]
    }

    /// A deposit from the origin chain to the destination chain.
    pub fn deposit(&self, deposit_id: u32, deposit_amount: U256, block: u64) -> DepositWithBlock {
        DepositWithBlock {
            deposit: Deposit {
                deposit_id,
                origin_chain_id: ORIGIN_CHAIN,
                destination_chain_id: DESTINATION_CHAIN,
                depositor: Address::repeat_byte(0xD0),
                recipient: Address::repeat_byte(0xD1),
                origin_token: self.l1_token,
                destination_token: self.l2_token,
                amount: deposit_amount,
                relayer_fee_pct: one_percent(),
                realized_lp_fee_pct: one_percent(),
                quote_timestamp: 1_650_000_000,
            },
            block_number: block,
            quote_block_number: 150,
        }
    }

    /// A fast fill completing `deposit` in one shot.
    pub fn full_fill(&self, deposit: &DepositWithBlock, block: u64) -> FillWithBlock {
        self.partial_fill(deposit, deposit.amount, deposit.amount, block)
    }

    /// A fast fill of `fill_amount` bringing the deposit's cumulative fill to
    /// `total_filled_amount`.
    pub fn partial_fill(
        &self,
        deposit: &DepositWithBlock,
        fill_amount: U256,
        total_filled_amount: U256,
        block: u64,
    ) -> FillWithBlock {
        FillWithBlock {
            fill: Fill {
                deposit_id: deposit.deposit_id,
                origin_chain_id: deposit.origin_chain_id,
                destination_chain_id: deposit.destination_chain_id,
                depositor: deposit.depositor,
                recipient: deposit.recipient,
                destination_token: deposit.destination_token,
                amount: deposit.amount,
                relayer_fee_pct: deposit.relayer_fee_pct,
                realized_lp_fee_pct: deposit.realized_lp_fee_pct,
                fill_amount,
                total_filled_amount,
                repayment_chain_id: DESTINATION_CHAIN,
                relayer: relayer(),
                is_slow_relay: false,
            },
            block_number: block,
            transaction_index: 0,
            log_index: 0,
        }
    }

    /// An updated hub pool client with the fixture's token pair and spoke
    /// deployments registered.
    pub fn hub_pool(&self) -> MockHubPoolClient {
        let mut hub = MockHubPoolClient::new();
        hub.latest_block_number = 200;
        hub.current_time = 1_650_000_500;
        hub.set_spoke_pool(ORIGIN_CHAIN, Address::repeat_byte(0x51));
        hub.set_spoke_pool(DESTINATION_CHAIN, Address::repeat_byte(0x52));
        hub.set_token_mapping(self.l1_token, DESTINATION_CHAIN, self.l2_token);
        // Mainnet maps the L1 token to itself.
        hub.set_token_mapping(self.l1_token, ORIGIN_CHAIN, self.l1_token);
        hub.next_bundle_start_blocks.insert(ORIGIN_CHAIN, 100);
        hub.next_bundle_start_blocks.insert(DESTINATION_CHAIN, 500);
        hub.token_infos.insert(
            (ORIGIN_CHAIN, self.l1_token),
            TokenInfo { symbol: "WETH".into(), decimals: 18 },
        );
        hub
    }

    /// Clients plus already-updated spoke snapshots: `deposits` on the origin
    /// chain, `fills` on the destination chain.
    pub fn clients(
        &self,
        deposits: Vec<DepositWithBlock>,
        fills: Vec<FillWithBlock>,
    ) -> (Clients, HashMap<u64, Arc<dyn SpokePoolClient>>) {
        self.build_clients(deposits, fills, true)
    }

    /// Same as [`Self::clients`], but the spoke snapshots still require
    /// `update()`.
    pub fn clients_without_update(
        &self,
        deposits: Vec<DepositWithBlock>,
        fills: Vec<FillWithBlock>,
    ) -> (Clients, HashMap<u64, Arc<dyn SpokePoolClient>>) {
        self.build_clients(deposits, fills, false)
    }

    fn build_clients(
        &self,
        deposits: Vec<DepositWithBlock>,
        fills: Vec<FillWithBlock>,
        updated: bool,
    ) -> (Clients, HashMap<u64, Arc<dyn SpokePoolClient>>) {
        let mut origin = MockSpokePoolClient::new(ORIGIN_CHAIN);
        for deposit in deposits {
            origin.push_deposit(deposit);
        }
        let mut destination = MockSpokePoolClient::new(DESTINATION_CHAIN);
        for fill in fills {
            destination.push_fill(fill);
        }
        let origin = Arc::new(origin);
        let destination = Arc::new(destination);
        if updated {
            origin.mark_updated();
            destination.mark_updated();
        }

        let mut factory = MockSpokePoolClientFactory::new();
        factory.register(origin.clone());
        factory.register(destination.clone());

        let clients = Clients {
            hub_pool: Arc::new(self.hub_pool()),
            config_store: Arc::new(MockConfigStoreClient::default()),
            spoke_pool_factory: Arc::new(factory),
            providers: [
                (
                    ORIGIN_CHAIN,
                    Arc::new(MockChainProvider::new(ORIGIN_CHAIN, 200)) as _,
                ),
                (
                    DESTINATION_CHAIN,
                    Arc::new(MockChainProvider::new(DESTINATION_CHAIN, 600)) as _,
                ),
            ]
            .into_iter()
            .collect(),
        };
        let spokes: HashMap<u64, Arc<dyn SpokePoolClient>> = [
            (ORIGIN_CHAIN, origin as Arc<dyn SpokePoolClient>),
            (DESTINATION_CHAIN, destination as Arc<dyn SpokePoolClient>),
        ]
        .into_iter()
        .collect();
        (clients, spokes)
    }
}
