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

use dataworker_utils::{math, Result};
use ethers::types::{Address, H256, I256, U256};

use crate::relay::Fill;

/// An inclusive block range `[start, end]` on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// First block of the range.
    pub start: u64,
    /// Last block of the range.
    pub end: u64,
}

impl BlockRange {
    /// Creates a new inclusive range.
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Whether `block` falls inside the range.
    pub fn contains(&self, block: u64) -> bool {
        self.start <= block && block <= self.end
    }
}

/// Refund accounting for one `(repayment chain, L2 token)` pair.
#[derive(Debug, Clone, Default)]
pub struct RefundGroup {
    /// Sum of per-relayer refunds, net of LP fees.
    pub total_refund_amount: U256,
    /// Sum of LP fees realized by the group's fills.
    pub realized_lp_fees: U256,
    /// Every valid in-range fill credited to the group, slow relays included.
    pub fills: Vec<Fill>,
    /// Per-relayer refund obligations, net of LP fees.
    pub refunds: HashMap<Address, U256>,
}

impl RefundGroup {
    /// Refund recipients sorted by descending refund amount, ties broken by
    /// ascending address bytes. Insertion order never leaks through.
    pub fn sorted_refunds(&self) -> Vec<(Address, U256)> {
        let mut refunds: Vec<(Address, U256)> = self
            .refunds
            .iter()
            .map(|(address, amount)| (*address, *amount))
            .collect();
        refunds.sort_by(|(addr_a, amt_a), (addr_b, amt_b)| {
            amt_b.cmp(amt_a).then_with(|| addr_a.cmp(addr_b))
        });
        refunds
    }
}

/// The three-level refund map: `repayment chain -> L2 token -> group`.
///
/// Insertion order is not observable; traversal order is imposed by the root
/// builders.
#[derive(Debug, Clone, Default)]
pub struct FillsToRefund(HashMap<u64, HashMap<Address, RefundGroup>>);

impl FillsToRefund {
    /// The group for `(chain_id, l2_token)`, created empty when absent.
    pub fn group_mut(&mut self, chain_id: u64, l2_token: Address) -> &mut RefundGroup {
        self.0.entry(chain_id).or_default().entry(l2_token).or_default()
    }

    /// The group for `(chain_id, l2_token)`, if any fills were credited.
    pub fn group(&self, chain_id: u64, l2_token: Address) -> Option<&RefundGroup> {
        self.0.get(&chain_id)?.get(&l2_token)
    }

    /// Iterates all `(chain, token, group)` triples, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Address, &RefundGroup)> {
        self.0.iter().flat_map(|(chain_id, tokens)| {
            tokens.iter().map(move |(token, group)| (*chain_id, *token, group))
        })
    }

    /// Whether any refunds were credited at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Signed running balances: `chain -> L1 token -> balance`.
#[derive(Debug, Clone, Default)]
pub struct RunningBalances(HashMap<u64, HashMap<Address, I256>>);

impl RunningBalances {
    /// Adds `delta` (possibly negative) to the balance for `(chain, token)`.
    pub fn add(&mut self, chain_id: u64, l1_token: Address, delta: I256) -> Result<()> {
        let balance = self.0.entry(chain_id).or_default().entry(l1_token).or_default();
        *balance = math::checked_add_signed(*balance, delta)?;
        Ok(())
    }

    /// The balance for `(chain, token)`, zero when never touched.
    pub fn get(&self, chain_id: u64, l1_token: Address) -> I256 {
        self.0
            .get(&chain_id)
            .and_then(|tokens| tokens.get(&l1_token))
            .copied()
            .unwrap_or_else(I256::zero)
    }

    /// The chains carrying at least one balance entry.
    pub fn chains(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.keys().copied()
    }

    /// The L1 tokens with an entry on `chain_id`.
    pub fn tokens_for_chain(&self, chain_id: u64) -> impl Iterator<Item = Address> + '_ {
        self.0.get(&chain_id).into_iter().flat_map(|tokens| tokens.keys().copied())
    }
}

/// Non-negative realized LP fees: `chain -> L1 token -> fees`.
#[derive(Debug, Clone, Default)]
pub struct RealizedLpFees(HashMap<u64, HashMap<Address, U256>>);

impl RealizedLpFees {
    /// Adds `amount` to the fees for `(chain, token)`.
    pub fn add(&mut self, chain_id: u64, l1_token: Address, amount: U256) -> Result<()> {
        let fees = self.0.entry(chain_id).or_default().entry(l1_token).or_default();
        *fees = math::checked_add(*fees, amount)?;
        Ok(())
    }

    /// The fees for `(chain, token)`, zero when never touched.
    pub fn get(&self, chain_id: u64, l1_token: Address) -> U256 {
        self.0
            .get(&chain_id)
            .and_then(|tokens| tokens.get(&l1_token))
            .copied()
            .unwrap_or_else(U256::zero)
    }

    /// The chains carrying at least one fee entry.
    pub fn chains(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.keys().copied()
    }

    /// The L1 tokens with an entry on `chain_id`.
    pub fn tokens_for_chain(&self, chain_id: u64) -> impl Iterator<Item = Address> + '_ {
        self.0.get(&chain_id).into_iter().flat_map(|tokens| tokens.keys().copied())
    }
}

/// The pending proposal as read from the HubPool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRootBundle {
    /// Account that submitted the proposal.
    pub proposer: Address,
    /// Timestamp after which the proposal becomes executable.
    pub challenge_period_end_timestamp: u32,
    /// Proposed bundle end block per chain, in evaluation order.
    pub bundle_evaluation_block_numbers: Vec<u64>,
    /// Pool rebalance leaves not yet executed.
    pub unclaimed_pool_rebalance_leaf_count: u32,
    /// Proposed pool rebalance root.
    pub pool_rebalance_root: H256,
    /// Proposed relayer refund root.
    pub relayer_refund_root: H256,
    /// Proposed slow relay root.
    pub slow_relay_root: H256,
}

/// Static token metadata exposed by the HubPool client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Ticker symbol.
    pub symbol: String,
    /// ERC-20 decimals.
    pub decimals: u8,
}
