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

//! Builds the pool rebalance root: one leaf per (chain, L1 token group),
//! carrying the net amounts the HubPool should move and the balances carried
//! forward under the transfer-threshold policy.
//!
//! Running balances are path-independent: refund credits, slow-fill excess
//! corrections and deposit outflows commute, so the final balance depends
//! only on the set of events, never on traversal order.

use dataworker_clients::{ConfigStoreClient, HubPoolClient};
use dataworker_config::DataworkerConfig;
use dataworker_merkle::MerkleTree;
use dataworker_types::{
    BlockRange, FillWithBlock, PoolRebalanceLeaf, RealizedLpFees, RunningBalances,
};
use dataworker_utils::{math, Error, Result};
use ethers::types::{Address, I256, U256};

use crate::bundle_data::BundleData;

/// The pool rebalance root plus the accounting the refund builder reuses.
pub struct PoolRebalanceRoot {
    /// The Merkle tree over the emitted leaves.
    pub tree: MerkleTree<PoolRebalanceLeaf>,
    /// Accumulated balances before the threshold policy split them into net
    /// sends and carries. The refund builder derives amounts-to-return from
    /// these.
    pub running_balances: RunningBalances,
    /// LP fees accumulated per chain and L1 token.
    pub realized_lp_fees: RealizedLpFees,
}

impl PoolRebalanceRoot {
    /// The emitted leaves in `leaf_id` order.
    pub fn leaves(&self) -> &[PoolRebalanceLeaf] {
        self.tree.leaves()
    }
}

/// Applies the transfer-threshold policy: balances at or above the threshold
/// move in full and zero the carry; smaller balances stay put.
pub(crate) fn net_send_amount(running_balance: I256, transfer_threshold: U256) -> I256 {
    if running_balance.unsigned_abs() >= transfer_threshold {
        running_balance
    } else {
        I256::zero()
    }
}

/// The transfer threshold for `l1_token`: the configured override when
/// present, else the ConfigStore value at the bundle-end mainnet block.
pub(crate) fn transfer_threshold_for(
    config: &DataworkerConfig,
    config_store: &dyn ConfigStoreClient,
    l1_token: Address,
    end_mainnet_block: u64,
) -> U256 {
    config
        .token_transfer_threshold_overrides
        .get(&l1_token)
        .copied()
        .unwrap_or_else(|| {
            config_store.token_transfer_threshold_for_block(l1_token, end_mainnet_block)
        })
}

/// Builds the pool rebalance root over `bundle` for `block_ranges`.
pub fn build_pool_rebalance_root(
    config: &DataworkerConfig,
    hub_pool: &dyn HubPoolClient,
    config_store: &dyn ConfigStoreClient,
    block_ranges: &[BlockRange],
    bundle: &BundleData,
) -> Result<PoolRebalanceRoot> {
    let end_mainnet_block = block_ranges[config.chain_index(config.hub_chain_id())?].end;

    let mut running_balances = RunningBalances::default();
    let mut realized_lp_fees = RealizedLpFees::default();

    // Refund credits: relayer reimbursements the SpokePools will owe.
    for (chain_id, l2_token, group) in bundle.fills_to_refund.iter() {
        let l1_token =
            hub_pool.l1_token_counterpart_at_block(chain_id, l2_token, end_mainnet_block)?;
        running_balances.add(chain_id, l1_token, math::to_signed(group.total_refund_amount)?)?;
        realized_lp_fees.add(chain_id, l1_token, group.realized_lp_fees)?;
    }

    subtract_excess_from_previous_slow_fills(
        config,
        hub_pool,
        end_mainnet_block,
        block_ranges,
        bundle,
        &mut running_balances,
    )?;

    // Deposit outflows. The L1 counterpart is resolved at the deposit's
    // quote block, not the bundle end, because fees were priced at quote
    // time.
    for deposit in &bundle.deposits {
        let l1_token = hub_pool.l1_token_counterpart_at_block(
            deposit.origin_chain_id,
            deposit.origin_token,
            deposit.quote_block_number,
        )?;
        let outflow = math::to_signed(deposit.amount)?
            .checked_neg()
            .ok_or(Error::Arithmetic("deposit outflow negation overflow"))?;
        running_balances.add(deposit.origin_chain_id, l1_token, outflow)?;
    }

    let leaves = emit_leaves(
        config,
        config_store,
        end_mainnet_block,
        &running_balances,
        &realized_lp_fees,
    );

    Ok(PoolRebalanceRoot { tree: MerkleTree::new(leaves), running_balances, realized_lp_fees })
}

/// Corrects running balances for slow fills dispatched by prior bundles that
/// the current bundle's fills made partially or fully unnecessary.
///
/// Only fills that complete their deposit can trigger a correction: while a
/// deposit stays short, the dispatched slow fill may yet execute, so the
/// excess is deferred. Deposits completed by their very first fill never had
/// a partial fill and thus never triggered a slow fill dispatch.
fn subtract_excess_from_previous_slow_fills(
    config: &DataworkerConfig,
    hub_pool: &dyn HubPoolClient,
    end_mainnet_block: u64,
    block_ranges: &[BlockRange],
    bundle: &BundleData,
    running_balances: &mut RunningBalances,
) -> Result<()> {
    for fill in bundle.all_valid_fills.iter().filter(|fill| {
        fill.fills_deposit_completely() && fill.fill_amount != fill.amount
    }) {
        let destination_range =
            block_ranges[config.chain_index(fill.destination_chain_id)?];
        if !destination_range.contains(fill.block_number) {
            continue;
        }

        let deposit_fills: Vec<&FillWithBlock> = bundle
            .all_valid_fills
            .iter()
            .filter(|other| {
                other.origin_chain_id == fill.origin_chain_id
                    && other.deposit_id == fill.deposit_id
            })
            .collect();

        let first_fill = deposit_fills
            .iter()
            .min_by_key(|f| f.block_coordinates())
            .ok_or(Error::Generic("fill list for deposit cannot be empty"))?;
        // A slow relay as the earliest fill means no relayer ever front-ran
        // the pool here; there is nothing to correct.
        if first_fill.is_slow_relay {
            continue;
        }
        // The slow fill was dispatched by a prior bundle only if the first
        // fill precedes this bundle's range on the destination chain.
        if first_fill.block_number >= destination_range.start {
            continue;
        }

        // The prior bundle sized the slow fill off the deposit's remainder
        // after its last fill inside that bundle.
        let last_prior_fill = deposit_fills
            .iter()
            .filter(|f| f.block_number < destination_range.start)
            .max_by_key(|f| f.total_filled_amount)
            .ok_or(Error::Generic("prior fill must exist when first fill is prior"))?;
        let sent_slow_fill_amount = fill
            .amount
            .checked_sub(last_prior_fill.total_filled_amount)
            .ok_or(Error::Arithmetic("slow fill amount underflow"))?;

        // If the completing fill is the slow relay execution itself, only
        // the unexecuted remainder of the dispatched amount is excess.
        let excess = if fill.is_slow_relay {
            sent_slow_fill_amount
                .checked_sub(fill.fill_amount)
                .ok_or(Error::Arithmetic("slow fill excess underflow"))?
        } else {
            sent_slow_fill_amount
        };
        if excess.is_zero() {
            continue;
        }

        let l1_token = hub_pool.l1_token_counterpart_at_block(
            fill.destination_chain_id,
            fill.destination_token,
            end_mainnet_block,
        )?;
        let correction = math::to_signed(excess)?
            .checked_neg()
            .ok_or(Error::Arithmetic("excess negation overflow"))?;
        running_balances.add(fill.destination_chain_id, l1_token, correction)?;
    }
    Ok(())
}

/// Emits leaves chain by chain in ascending chain-id order, L1 tokens in
/// ascending byte order, chunked by the per-chain L1 token cap.
fn emit_leaves(
    config: &DataworkerConfig,
    config_store: &dyn ConfigStoreClient,
    end_mainnet_block: u64,
    running_balances: &RunningBalances,
    realized_lp_fees: &RealizedLpFees,
) -> Vec<PoolRebalanceLeaf> {
    let max_l1_token_count = config
        .max_l1_token_count_override
        .unwrap_or_else(|| config_store.max_l1_token_count_for_block(end_mainnet_block))
        .max(1) as usize;

    let mut chain_ids: Vec<u64> =
        running_balances.chains().chain(realized_lp_fees.chains()).collect();
    chain_ids.sort_unstable();
    chain_ids.dedup();

    let mut leaves = Vec::new();
    let mut leaf_id = 0u32;
    for chain_id in chain_ids {
        let mut l1_tokens: Vec<Address> = running_balances
            .tokens_for_chain(chain_id)
            .chain(realized_lp_fees.tokens_for_chain(chain_id))
            .collect();
        l1_tokens.sort_unstable();
        l1_tokens.dedup();

        for (group_index, token_group) in l1_tokens.chunks(max_l1_token_count).enumerate() {
            let mut leaf = PoolRebalanceLeaf {
                chain_id,
                group_index: group_index as u32,
                bundle_lp_fees: Vec::with_capacity(token_group.len()),
                net_send_amounts: Vec::with_capacity(token_group.len()),
                running_balances: Vec::with_capacity(token_group.len()),
                l1_tokens: token_group.to_vec(),
                leaf_id,
            };
            for l1_token in token_group {
                let balance = running_balances.get(chain_id, *l1_token);
                let threshold =
                    transfer_threshold_for(config, config_store, *l1_token, end_mainnet_block);
                let net_send = net_send_amount(balance, threshold);
                let carry = if net_send.is_zero() { balance } else { I256::zero() };
                leaf.bundle_lp_fees.push(realized_lp_fees.get(chain_id, *l1_token));
                leaf.net_send_amounts.push(net_send);
                leaf.running_balances.push(carry);
            }
            leaves.push(leaf);
            leaf_id += 1;
        }
    }
    leaves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle_data::load_bundle_data;
    use crate::test_utils::*;

    fn build(fixture: &TwoChainFixture, bundle: &BundleData) -> PoolRebalanceRoot {
        let (clients, _) = fixture.clients(vec![], vec![]);
        build_pool_rebalance_root(
            &fixture.config,
            clients.hub_pool.as_ref(),
            clients.config_store.as_ref(),
            &fixture.ranges(),
            bundle,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn refund_credits_and_deposit_outflow_offset_each_other() {
        let fixture = TwoChainFixture::new();
        let deposit = fixture.deposit(7, amount(1000), 150);
        let fill = fixture.full_fill(&deposit, 550);

        let (clients, spokes) = fixture.clients(vec![deposit], vec![fill]);
        let bundle = load_bundle_data(
            &fixture.config,
            clients.hub_pool.as_ref(),
            clients.config_store.as_ref(),
            &spokes,
            &fixture.ranges(),
        )
        .unwrap();
        let root = build(&fixture, &bundle);

        // Destination owes the relayer 990 (net of the 1% LP fee).
        assert_eq!(
            root.running_balances.get(DESTINATION_CHAIN, fixture.l1_token),
            signed(990)
        );
        // Origin collected the full deposit.
        assert_eq!(root.running_balances.get(ORIGIN_CHAIN, fixture.l1_token), signed(-1000));
        assert_eq!(root.realized_lp_fees.get(DESTINATION_CHAIN, fixture.l1_token), amount(10));

        // One leaf per chain; zero threshold sends the whole balance.
        let leaves = root.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].chain_id, ORIGIN_CHAIN);
        assert_eq!(leaves[0].net_send_amounts, vec![signed(-1000)]);
        assert_eq!(leaves[0].running_balances, vec![I256::zero()]);
        assert_eq!(leaves[1].chain_id, DESTINATION_CHAIN);
        assert_eq!(leaves[1].net_send_amounts, vec![signed(990)]);
        assert_eq!(leaves[1].bundle_lp_fees, vec![amount(10)]);
        assert_eq!(leaves.iter().map(|l| l.leaf_id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn balances_below_the_threshold_are_carried_forward() {
        let mut fixture = TwoChainFixture::new();
        fixture
            .config
            .token_transfer_threshold_overrides
            .insert(fixture.l1_token, amount(10_000));
        let deposit = fixture.deposit(7, amount(1000), 150);
        let fill = fixture.full_fill(&deposit, 550);

        let (clients, spokes) = fixture.clients(vec![deposit], vec![fill]);
        let bundle = load_bundle_data(
            &fixture.config,
            clients.hub_pool.as_ref(),
            clients.config_store.as_ref(),
            &spokes,
            &fixture.ranges(),
        )
        .unwrap();
        let root = build(&fixture, &bundle);

        for leaf in root.leaves() {
            assert_eq!(leaf.net_send_amounts, vec![I256::zero()]);
        }
        let destination_leaf = &root.leaves()[1];
        assert_eq!(destination_leaf.running_balances, vec![signed(990)]);
    }

    #[tokio::test]
    async fn completing_a_previously_slow_filled_deposit_subtracts_the_excess() {
        let fixture = TwoChainFixture::new();
        let deposit = fixture.deposit(7, amount(1000), 150);
        // A prior bundle saw a 400 partial fill (before block 500), so it
        // dispatched a 600 slow fill. A fast fill now completes the deposit,
        // stranding the whole 600.
        let prior_fill = fixture.partial_fill(&deposit, amount(400), amount(400), 450);
        let completing_fill = fixture.partial_fill(&deposit, amount(600), amount(1000), 550);

        let (clients, spokes) =
            fixture.clients(vec![deposit], vec![prior_fill, completing_fill]);
        let bundle = load_bundle_data(
            &fixture.config,
            clients.hub_pool.as_ref(),
            clients.config_store.as_ref(),
            &spokes,
            &fixture.ranges(),
        )
        .unwrap();
        let root = build(&fixture, &bundle);

        // 594 refund credit (600 net of 1% LP fee) minus the 600 excess.
        assert_eq!(
            root.running_balances.get(DESTINATION_CHAIN, fixture.l1_token),
            signed(594 - 600)
        );
    }

    #[tokio::test]
    async fn slow_relay_execution_only_strands_the_unexecuted_remainder() {
        let fixture = TwoChainFixture::new();
        let deposit = fixture.deposit(7, amount(1000), 150);
        let prior_fill = fixture.partial_fill(&deposit, amount(400), amount(400), 450);
        // The dispatched 600 slow fill executes, but relayers filled another
        // 100 in between (outside any refund here for simplicity), so the
        // slow relay pays only 500 of its 600.
        let interleaved = fixture.partial_fill(&deposit, amount(100), amount(500), 460);
        let mut slow_execution = fixture.partial_fill(&deposit, amount(500), amount(1000), 560);
        slow_execution.fill.is_slow_relay = true;

        let (clients, spokes) =
            fixture.clients(vec![deposit], vec![prior_fill, interleaved, slow_execution]);
        let bundle = load_bundle_data(
            &fixture.config,
            clients.hub_pool.as_ref(),
            clients.config_store.as_ref(),
            &spokes,
            &fixture.ranges(),
        )
        .unwrap();
        let root = build(&fixture, &bundle);

        // The prior bundle sized the slow fill at 1000 - 500 = 500; it all
        // executed, so nothing is stranded. The slow execution itself earns
        // no refund, so the balance stays at the LP-fee-only credit of zero
        // refunds == 0.
        assert_eq!(
            root.running_balances.get(DESTINATION_CHAIN, fixture.l1_token),
            I256::zero()
        );
    }

    #[tokio::test]
    async fn identical_snapshots_produce_identical_roots() {
        let fixture = TwoChainFixture::new();
        let deposit = fixture.deposit(7, amount(1000), 150);
        let fill = fixture.full_fill(&deposit, 550);

        let (clients, spokes) = fixture.clients(vec![deposit], vec![fill]);
        let bundle = load_bundle_data(
            &fixture.config,
            clients.hub_pool.as_ref(),
            clients.config_store.as_ref(),
            &spokes,
            &fixture.ranges(),
        )
        .unwrap();
        let first = build(&fixture, &bundle);
        let second = build(&fixture, &bundle);
        assert_eq!(first.tree.root(), second.tree.root());
        assert_eq!(first.leaves(), second.leaves());
    }
}
