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

use std::collections::HashMap;
use std::sync::Arc;

use dataworker_clients::{Clients, SpokePoolClient};
use dataworker_config::DataworkerConfig;
use dataworker_tx_queue::TransactionQueue;
use dataworker_types::BlockRange;
use dataworker_utils::Result;

use crate::bundle_data::{load_bundle_data, BundleData};
use crate::pool_rebalance::{build_pool_rebalance_root, PoolRebalanceRoot};
use crate::relayer_refund::{build_relayer_refund_root, RelayerRefundRoot};
use crate::slow_relay::{build_slow_relay_root, SlowRelayRoot};

/// The dataworker: proposes root bundles when none is pending and validates
/// pending ones otherwise.
///
/// Holds no mutable state; every cycle re-reads the world through the client
/// snapshots and leaves its outputs on the transaction queue.
pub struct Dataworker {
    pub(crate) config: Arc<DataworkerConfig>,
    pub(crate) clients: Clients,
    pub(crate) tx_queue: TransactionQueue,
}

/// The three recomputed roots of one bundle.
pub struct BundleRoots {
    /// The assembled event data the roots were built from.
    pub bundle_data: BundleData,
    /// The pool rebalance root and its accounting byproducts.
    pub pool_rebalance: PoolRebalanceRoot,
    /// The relayer refund root.
    pub relayer_refund: RelayerRefundRoot,
    /// The slow relay root.
    pub slow_relay: SlowRelayRoot,
}

impl Dataworker {
    /// Creates a dataworker over the given configuration, client bundle and
    /// transaction sink.
    pub fn new(
        config: Arc<DataworkerConfig>,
        clients: Clients,
        tx_queue: TransactionQueue,
    ) -> Self {
        Self { config, clients, tx_queue }
    }

    /// Computes the widest block range every chain could currently support:
    /// per chain, from one past the last executed bundle's end block up to
    /// the chain's head. Head queries run in parallel and are reassembled
    /// index-by-index, so the result follows the evaluation order exactly.
    pub(crate) async fn widest_possible_block_ranges(&self) -> Result<Vec<BlockRange>> {
        let hub_pool = &self.clients.hub_pool;
        let latest_mainnet_block = hub_pool.latest_block_number();

        let head_queries = self
            .config
            .chain_id_list
            .iter()
            .map(|chain_id| async move {
                self.clients.provider(*chain_id)?.get_block_number().await
            })
            .collect::<Vec<_>>();
        let heads = futures::future::try_join_all(head_queries).await?;

        Ok(self
            .config
            .chain_id_list
            .iter()
            .zip(heads)
            .map(|(chain_id, head)| {
                let start = hub_pool.next_bundle_start_block(
                    &self.config.chain_id_list,
                    latest_mainnet_block,
                    *chain_id,
                );
                BlockRange::new(start, head)
            })
            .collect())
    }

    /// Constructs one read-only SpokePool client per chain, pinned at the
    /// SpokePool address that was canonical at `end_mainnet_block`, and
    /// updates them all in parallel. Pinning at the historical deployment
    /// keeps refunds flowing for deposits made against a since-deprecated
    /// SpokePool.
    pub async fn spoke_pool_clients_at_block(
        &self,
        end_mainnet_block: u64,
    ) -> Result<HashMap<u64, Arc<dyn SpokePoolClient>>> {
        let mut clients = HashMap::new();
        for chain_id in &self.config.chain_id_list {
            let address = self
                .clients
                .hub_pool
                .spoke_pool_for_block(end_mainnet_block, *chain_id)?;
            let client = self.clients.spoke_pool_factory.for_deployment(*chain_id, address)?;
            clients.insert(*chain_id, client);
        }
        let updates = clients.values().map(|client| client.update()).collect::<Vec<_>>();
        futures::future::try_join_all(updates).await?;
        Ok(clients)
    }

    /// Rebuilds all three roots over `block_ranges` from the given spoke
    /// client snapshots. The pool rebalance root is built before the refund
    /// root because the latter derives its amounts-to-return from the
    /// former's running balances.
    pub fn build_roots(
        &self,
        block_ranges: &[BlockRange],
        spoke_pool_clients: &HashMap<u64, Arc<dyn SpokePoolClient>>,
    ) -> Result<BundleRoots> {
        let bundle_data = load_bundle_data(
            &self.config,
            self.clients.hub_pool.as_ref(),
            self.clients.config_store.as_ref(),
            spoke_pool_clients,
            block_ranges,
        )?;

        let pool_rebalance = build_pool_rebalance_root(
            &self.config,
            self.clients.hub_pool.as_ref(),
            self.clients.config_store.as_ref(),
            block_ranges,
            &bundle_data,
        )?;

        let end_mainnet_block =
            block_ranges[self.config.chain_index(self.config.hub_chain_id())?].end;
        let relayer_refund = build_relayer_refund_root(
            &self.config,
            self.clients.hub_pool.as_ref(),
            self.clients.config_store.as_ref(),
            end_mainnet_block,
            &bundle_data.fills_to_refund,
            &pool_rebalance,
        )?;

        let slow_relay = build_slow_relay_root(&bundle_data.unfilled_deposits)?;

        Ok(BundleRoots { bundle_data, pool_rebalance, relayer_refund, slow_relay })
    }

    /// The bundle-end mainnet block of `block_ranges`.
    pub(crate) fn end_mainnet_block(&self, block_ranges: &[BlockRange]) -> Result<u64> {
        Ok(block_ranges[self.config.chain_index(self.config.hub_chain_id())?].end)
    }
}
