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

//! Walks every ordered (origin, destination) chain pair, correlates fills
//! with deposits, and accumulates the refund-credit and unfilled-deposit maps
//! the root builders consume.
//!
//! The output maps are unordered; determinism of the final roots is imposed
//! by the builders. The loader itself is deterministic in what it includes:
//! deposit de-dup keeps the earliest-indexed occurrence and fill correlation
//! uses exactly `(origin chain, deposit id)`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dataworker_clients::{ConfigStoreClient, HubPoolClient, SpokePoolClient};
use dataworker_config::DataworkerConfig;
use dataworker_types::{
    BlockRange, Deposit, DepositWithBlock, FillWithBlock, FillsToRefund, UnfilledDeposit,
};
use dataworker_utils::{math, probe, Error, Result};
use ethers::types::{Address, U256};

/// Everything the root builders need, assembled from one snapshot of the
/// spoke clients.
#[derive(Debug, Default)]
pub struct BundleData {
    /// Refund credits grouped by repayment chain and L2 token.
    pub fills_to_refund: FillsToRefund,
    /// Deposits with a positive unfilled remainder, slow relay candidates.
    pub unfilled_deposits: Vec<UnfilledDeposit>,
    /// Every fill that matched a deposit, in range or not. The pool
    /// rebalance builder scans these for slow fills dispatched by prior
    /// bundles.
    pub all_valid_fills: Vec<FillWithBlock>,
    /// All in-range deposits, de-duplicated, across every chain pair.
    pub deposits: Vec<DepositWithBlock>,
}

/// Per-deposit unfilled bookkeeping, keyed by `(origin chain, deposit id)`
/// while the loader walks the chain pairs.
struct UnfilledState {
    deposit: Deposit,
    max_total_filled_amount: U256,
    has_first_fill_in_range: bool,
}

/// Assembles [`BundleData`] for `block_ranges`, one range per chain in the
/// configured evaluation order.
pub fn load_bundle_data(
    config: &DataworkerConfig,
    hub_pool: &dyn HubPoolClient,
    config_store: &dyn ConfigStoreClient,
    spoke_pool_clients: &HashMap<u64, Arc<dyn SpokePoolClient>>,
    block_ranges: &[BlockRange],
) -> Result<BundleData> {
    if !hub_pool.is_updated() {
        return Err(Error::ClientNotUpdated { client: "HubPool" });
    }
    if !config_store.is_updated() {
        return Err(Error::ClientNotUpdated { client: "ConfigStore" });
    }
    if block_ranges.len() != config.chain_id_list.len() {
        return Err(Error::BlockRangeLengthMismatch {
            expected: config.chain_id_list.len(),
            got: block_ranges.len(),
        });
    }
    for chain_id in &config.chain_id_list {
        let client = spoke_client(spoke_pool_clients, *chain_id)?;
        if !client.is_updated() {
            return Err(Error::ClientNotUpdated { client: "SpokePool" });
        }
    }

    let end_mainnet_block = block_ranges[config.chain_index(config.hub_chain_id())?].end;

    let mut data = BundleData::default();
    let mut unfilled: HashMap<(u64, u32), UnfilledState> = HashMap::new();
    let mut seen_deposits: HashSet<(u64, u32)> = HashSet::new();
    let mut invalid_fills: Vec<FillWithBlock> = Vec::new();

    for (origin_index, origin_chain_id) in config.chain_id_list.iter().copied().enumerate() {
        let origin_client = spoke_client(spoke_pool_clients, origin_chain_id)?;
        let origin_range = block_ranges[origin_index];

        for (destination_index, destination_chain_id) in
            config.chain_id_list.iter().copied().enumerate()
        {
            if origin_chain_id == destination_chain_id {
                continue;
            }
            let destination_client = spoke_client(spoke_pool_clients, destination_chain_id)?;
            let destination_range = block_ranges[destination_index];

            // In-range deposits for this pair; the earliest-indexed
            // occurrence of a deposit id wins.
            for deposit in origin_client.deposits_for_destination_chain(destination_chain_id) {
                if !origin_range.contains(deposit.block_number) {
                    continue;
                }
                if seen_deposits.insert((deposit.origin_chain_id, deposit.deposit_id)) {
                    data.deposits.push(deposit);
                }
            }

            for fill in destination_client.fills_with_block_for_origin_chain(origin_chain_id) {
                // Correlate against the origin client's full history, not the
                // block range: an in-range fill may execute an old deposit.
                let Some(matched_deposit) = origin_client.deposit_for_fill(&fill) else {
                    invalid_fills.push(fill);
                    continue;
                };

                // Kept regardless of range so the pool rebalance builder can
                // reconstruct slow fills dispatched by prior bundles.
                data.all_valid_fills.push(fill.clone());

                if !destination_range.contains(fill.block_number) {
                    continue;
                }

                let (refund_chain_id, refund_token) =
                    refund_info_for_fill(&fill, hub_pool, end_mainnet_block)?;

                let lp_fee = math::fee_amount(fill.fill_amount, fill.realized_lp_fee_pct)?;
                let group = data.fills_to_refund.group_mut(refund_chain_id, refund_token);
                group.realized_lp_fees = math::checked_add(group.realized_lp_fees, lp_fee)?;
                group.fills.push(fill.fill.clone());

                // Slow relays are paid from pool liquidity; no relayer is
                // owed a refund for them.
                if !fill.is_slow_relay {
                    let refund =
                        math::amount_net_of_fee(fill.fill_amount, fill.realized_lp_fee_pct)?;
                    group.total_refund_amount =
                        math::checked_add(group.total_refund_amount, refund)?;
                    let credited = group.refunds.entry(fill.relayer).or_default();
                    *credited = math::checked_add(*credited, refund)?;
                }

                update_unfilled_state(&mut unfilled, &matched_deposit, &fill, &destination_range);
            }
        }
    }

    data.unfilled_deposits = flatten_unfilled(unfilled)?;

    if !invalid_fills.is_empty() {
        tracing::info!(
            count = invalid_fills.len(),
            "invalid fills in range: no matching deposit found",
        );
    }
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::BundleData,
        deposits = data.deposits.len(),
        valid_fills = data.all_valid_fills.len(),
        invalid_fills = invalid_fills.len(),
        unfilled_deposits = data.unfilled_deposits.len(),
    );

    Ok(data)
}

/// Where a fill gets refunded: slow relays always refund on the destination
/// chain in the destination token; fast fills refund on the relayer's chosen
/// repayment chain, in the L2 counterpart of the destination token's L1 token
/// as of the bundle-end mainnet block.
pub(crate) fn refund_info_for_fill(
    fill: &FillWithBlock,
    hub_pool: &dyn HubPoolClient,
    end_mainnet_block: u64,
) -> Result<(u64, Address)> {
    if fill.is_slow_relay {
        return Ok((fill.destination_chain_id, fill.destination_token));
    }
    let l1_token = hub_pool.l1_token_counterpart_at_block(
        fill.destination_chain_id,
        fill.destination_token,
        end_mainnet_block,
    )?;
    let repayment_token =
        hub_pool.destination_token_for_l1_token(l1_token, fill.repayment_chain_id)?;
    Ok((fill.repayment_chain_id, repayment_token))
}

fn update_unfilled_state(
    unfilled: &mut HashMap<(u64, u32), UnfilledState>,
    matched_deposit: &DepositWithBlock,
    fill: &FillWithBlock,
    destination_range: &BlockRange,
) {
    let key = (fill.origin_chain_id, fill.deposit_id);
    let state = unfilled.entry(key).or_insert_with(|| UnfilledState {
        deposit: matched_deposit.deposit.clone(),
        max_total_filled_amount: U256::zero(),
        has_first_fill_in_range: false,
    });
    state.max_total_filled_amount = state.max_total_filled_amount.max(fill.total_filled_amount);
    if fill.is_first_fill() && destination_range.contains(fill.block_number) {
        state.has_first_fill_in_range = true;
    }
}

/// Emits one [`UnfilledDeposit`] per deposit still short of its amount,
/// discarding fully filled ones. Sorted by identity for stable logs; the slow
/// relay builder re-imposes its own total order anyway.
fn flatten_unfilled(unfilled: HashMap<(u64, u32), UnfilledState>) -> Result<Vec<UnfilledDeposit>> {
    let mut result = Vec::new();
    for state in unfilled.into_values() {
        if state.max_total_filled_amount >= state.deposit.amount {
            continue;
        }
        let unfilled_amount = state
            .deposit
            .amount
            .checked_sub(state.max_total_filled_amount)
            .ok_or(Error::Arithmetic("unfilled amount underflow"))?;
        result.push(UnfilledDeposit {
            deposit: state.deposit,
            unfilled_amount,
            has_first_fill_in_range: state.has_first_fill_in_range,
        });
    }
    result.sort_by_key(|u| (u.deposit.origin_chain_id, u.deposit.deposit_id));
    Ok(result)
}

fn spoke_client(
    clients: &HashMap<u64, Arc<dyn SpokePoolClient>>,
    chain_id: u64,
) -> Result<&Arc<dyn SpokePoolClient>> {
    clients.get(&chain_id).ok_or(Error::SpokePoolClientNotFound { chain_id })
}
