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

//! Builds the relayer refund root: per (repayment chain, L2 token) group the
//! sorted refund recipients, chunked to the leaf cap, plus return-only leaves
//! so SpokePools can send excess liquidity back even where no relayer is owed
//! anything.

use std::collections::HashSet;

use dataworker_clients::{ConfigStoreClient, HubPoolClient};
use dataworker_config::DataworkerConfig;
use dataworker_merkle::MerkleTree;
use dataworker_types::{FillsToRefund, RelayerRefundLeaf, RelayerRefundLeafBuilder};
use dataworker_utils::{Error, Result};
use ethers::types::U256;

use crate::pool_rebalance::{net_send_amount, transfer_threshold_for, PoolRebalanceRoot};

/// The relayer refund root.
pub struct RelayerRefundRoot {
    /// The Merkle tree over the final leaves.
    pub tree: MerkleTree<RelayerRefundLeaf>,
}

impl RelayerRefundRoot {
    /// The final leaves in `leaf_id` order.
    pub fn leaves(&self) -> &[RelayerRefundLeaf] {
        self.tree.leaves()
    }
}

/// Builds the relayer refund root from the refund groups and the pool
/// rebalance accounting.
pub fn build_relayer_refund_root(
    config: &DataworkerConfig,
    hub_pool: &dyn HubPoolClient,
    config_store: &dyn ConfigStoreClient,
    end_mainnet_block: u64,
    fills_to_refund: &FillsToRefund,
    pool_rebalance: &PoolRebalanceRoot,
) -> Result<RelayerRefundRoot> {
    let max_refund_count = config
        .max_refund_count_override
        .unwrap_or_else(|| config_store.max_refund_count_for_block(end_mainnet_block))
        .max(1) as usize;

    let mut builders: Vec<RelayerRefundLeafBuilder> = Vec::new();

    // Phase A: one leaf group per (repayment chain, L2 token) with refunds.
    for (chain_id, l2_token, group) in fills_to_refund.iter() {
        let sorted_refunds = group.sorted_refunds();
        for window in sorted_refunds.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(Error::DuplicateRefundAddress(window[0].0));
            }
        }

        let l1_token =
            hub_pool.l1_token_counterpart_at_block(chain_id, l2_token, end_mainnet_block)?;
        let balance = pool_rebalance.running_balances.get(chain_id, l1_token);
        let threshold = transfer_threshold_for(config, config_store, l1_token, end_mainnet_block);
        let net_send = net_send_amount(balance, threshold);
        let amount_to_return =
            if net_send.is_negative() { net_send.unsigned_abs() } else { U256::zero() };

        for (chunk_index, chunk) in sorted_refunds.chunks(max_refund_count).enumerate() {
            builders.push(RelayerRefundLeafBuilder {
                // Only the first chunk of a group carries the return.
                amount_to_return: if chunk_index == 0 { amount_to_return } else { U256::zero() },
                chain_id,
                refund_amounts: chunk.iter().map(|(_, amount)| *amount).collect(),
                l2_token_address: l2_token,
                refund_addresses: chunk.iter().map(|(address, _)| *address).collect(),
                group_index: (chunk_index * max_refund_count) as u32,
            });
        }
    }

    // Phase B: return-only leaves for negative net sends with no refunds.
    let existing: HashSet<(u64, ethers::types::Address)> =
        builders.iter().map(|leaf| (leaf.chain_id, leaf.l2_token_address)).collect();
    for leaf in pool_rebalance.leaves() {
        for (index, net_send) in leaf.net_send_amounts.iter().enumerate() {
            if !net_send.is_negative() {
                continue;
            }
            let l2_token =
                hub_pool.destination_token_for_l1_token(leaf.l1_tokens[index], leaf.chain_id)?;
            if existing.contains(&(leaf.chain_id, l2_token)) {
                continue;
            }
            builders.push(RelayerRefundLeafBuilder {
                amount_to_return: net_send.unsigned_abs(),
                chain_id: leaf.chain_id,
                refund_amounts: Vec::new(),
                l2_token_address: l2_token,
                refund_addresses: Vec::new(),
                group_index: 0,
            });
        }
    }

    // Phase C: impose the total order and assign ids.
    builders.sort_by_key(RelayerRefundLeafBuilder::sort_key);
    for window in builders.windows(2) {
        if window[0].sort_key() == window[1].sort_key() {
            let (chain_id, l2_token, group_index) = window[0].sort_key();
            return Err(Error::DuplicateRefundLeafKey { chain_id, l2_token, group_index });
        }
    }

    let leaves = builders
        .into_iter()
        .enumerate()
        .map(|(leaf_id, builder)| builder.into_leaf(leaf_id as u32))
        .collect();

    Ok(RelayerRefundRoot { tree: MerkleTree::new(leaves) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle_data::load_bundle_data;
    use crate::pool_rebalance::build_pool_rebalance_root;
    use crate::test_utils::*;
    use dataworker_types::{DepositWithBlock, FillWithBlock};
    use ethers::types::Address;

    fn build_roots(
        fixture: &TwoChainFixture,
        deposits: Vec<DepositWithBlock>,
        fills: Vec<FillWithBlock>,
    ) -> (PoolRebalanceRoot, RelayerRefundRoot) {
        let (clients, spokes) = fixture.clients(deposits, fills);
        let ranges = fixture.ranges();
        let bundle = load_bundle_data(
            &fixture.config,
            clients.hub_pool.as_ref(),
            clients.config_store.as_ref(),
            &spokes,
            &ranges,
        )
        .unwrap();
        let pool = build_pool_rebalance_root(
            &fixture.config,
            clients.hub_pool.as_ref(),
            clients.config_store.as_ref(),
            &ranges,
            &bundle,
        )
        .unwrap();
        let refund = build_relayer_refund_root(
            &fixture.config,
            clients.hub_pool.as_ref(),
            clients.config_store.as_ref(),
            ranges[0].end,
            &bundle.fills_to_refund,
            &pool,
        )
        .unwrap();
        (pool, refund)
    }

    #[tokio::test]
    async fn refunds_are_sorted_descending_then_by_address() {
        let fixture = TwoChainFixture::new();
        let deposit_a = fixture.deposit(1, amount(1000), 150);
        let deposit_b = fixture.deposit(2, amount(3000), 151);
        let mut fill_a = fixture.full_fill(&deposit_a, 550);
        fill_a.fill.relayer = Address::repeat_byte(0x02);
        let mut fill_b = fixture.full_fill(&deposit_b, 551);
        fill_b.fill.relayer = Address::repeat_byte(0x01);

        let (_, refund) =
            build_roots(&fixture, vec![deposit_a, deposit_b], vec![fill_a, fill_b]);

        let leaves = refund.leaves();
        assert_eq!(leaves.len(), 1);
        let leaf = &leaves[0];
        // The bigger refund (2970) leads despite the higher address bytes.
        assert_eq!(
            leaf.refund_addresses,
            vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02)]
        );
        assert_eq!(leaf.refund_amounts, vec![amount(2970), amount(990)]);
        assert_eq!(leaf.amount_to_return, U256::zero());
        assert_eq!(leaf.leaf_id, 0);
    }

    #[tokio::test]
    async fn refund_conservation_across_chunked_leaves() {
        let mut fixture = TwoChainFixture::new();
        fixture.config.max_refund_count_override = Some(2);

        let mut deposits = Vec::new();
        let mut fills = Vec::new();
        for i in 0..5u8 {
            let deposit = fixture.deposit(i as u32, amount(1000), 150 + i as u64);
            let mut fill = fixture.full_fill(&deposit, 550 + i as u64);
            fill.fill.relayer = Address::repeat_byte(i + 1);
            deposits.push(deposit);
            fills.push(fill);
        }

        let (_, refund) = build_roots(&fixture, deposits, fills);
        let leaves = refund.leaves();
        // Five recipients at two per leaf.
        assert_eq!(leaves.len(), 3);
        let total: U256 = leaves
            .iter()
            .flat_map(|leaf| leaf.refund_amounts.iter().copied())
            .fold(U256::zero(), |acc, amount| acc + amount);
        // Five fills of 1000 at 1% LP fee each.
        assert_eq!(total, amount(5 * 990));
        // Ordered leaf ids, group structure intact.
        assert_eq!(leaves.iter().map(|l| l.leaf_id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(leaves[0].refund_addresses.len(), 2);
        assert_eq!(leaves[2].refund_addresses.len(), 1);
    }

    #[tokio::test]
    async fn negative_net_send_without_refunds_gets_a_return_only_leaf() {
        let fixture = TwoChainFixture::new();
        // A deposit with no fills: the origin chain owes the pool the whole
        // amount and nobody is owed a refund there.
        let deposit = fixture.deposit(7, amount(1000), 150);

        let (pool, refund) = build_roots(&fixture, vec![deposit], vec![]);
        assert_eq!(pool.leaves().len(), 1);
        assert_eq!(pool.leaves()[0].net_send_amounts, vec![signed(-1000)]);

        let leaves = refund.leaves();
        assert_eq!(leaves.len(), 1);
        let leaf = &leaves[0];
        assert_eq!(leaf.chain_id, ORIGIN_CHAIN);
        // The origin chain's own token (mainnet maps the L1 token to itself).
        assert_eq!(leaf.l2_token_address, fixture.l1_token);
        assert!(leaf.refund_addresses.is_empty());
        assert!(leaf.refund_amounts.is_empty());
        assert_eq!(leaf.amount_to_return, amount(1000));
    }

    #[tokio::test]
    async fn first_chunk_carries_the_amount_to_return() {
        let mut fixture = TwoChainFixture::new();
        fixture.config.max_refund_count_override = Some(1);
        // The origin outflow forces a return-only leaf there; the refund
        // chunks on the destination all carry a zero return.
        let deposit = fixture.deposit(7, amount(1000), 150);
        let mut fill_a = fixture.partial_fill(&deposit, amount(400), amount(400), 550);
        fill_a.fill.relayer = Address::repeat_byte(0x01);
        let mut fill_b = fixture.partial_fill(&deposit, amount(600), amount(1000), 551);
        fill_b.fill.relayer = Address::repeat_byte(0x02);

        let (_, refund) = build_roots(&fixture, vec![deposit], vec![fill_a, fill_b]);
        let leaves = refund.leaves();
        // Origin return-only leaf plus two single-recipient chunks.
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].chain_id, ORIGIN_CHAIN);
        assert_eq!(leaves[0].amount_to_return, amount(1000));
        assert_eq!(leaves[1].chain_id, DESTINATION_CHAIN);
        assert_eq!(leaves[1].amount_to_return, U256::zero());
        assert_eq!(leaves[2].amount_to_return, U256::zero());
        // Chunks keep the refund sort: 600-fill relayer first.
        assert_eq!(leaves[1].refund_addresses, vec![Address::repeat_byte(0x02)]);
        assert_eq!(leaves[2].refund_addresses, vec![Address::repeat_byte(0x01)]);
    }
}
