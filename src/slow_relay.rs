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

//! Builds the slow relay root: one relay-data leaf per unfilled deposit,
//! ordered by (origin chain, deposit id). The leaf carries the full deposit
//! amount; the SpokePool pays out only the unfilled portion at execution.

use dataworker_merkle::MerkleTree;
use dataworker_types::{RelayData, UnfilledDeposit};
use dataworker_utils::{Error, Result};

/// The slow relay root.
pub struct SlowRelayRoot {
    /// The Merkle tree over the relay-data leaves.
    pub tree: MerkleTree<RelayData>,
}

impl SlowRelayRoot {
    /// The leaves in sorted order.
    pub fn leaves(&self) -> &[RelayData] {
        self.tree.leaves()
    }
}

/// Projects `unfilled_deposits` into relay data and builds the tree.
///
/// `(origin chain, deposit id)` is globally unique, so two equal sort keys
/// mean corrupted upstream data and fail the cycle.
pub fn build_slow_relay_root(unfilled_deposits: &[UnfilledDeposit]) -> Result<SlowRelayRoot> {
    let mut leaves: Vec<RelayData> = unfilled_deposits
        .iter()
        .map(|unfilled| RelayData::from_deposit(&unfilled.deposit))
        .collect();
    leaves.sort_by_key(RelayData::sort_key);
    for window in leaves.windows(2) {
        if window[0].sort_key() == window[1].sort_key() {
            let (origin_chain_id, deposit_id) = window[0].sort_key();
            return Err(Error::DuplicateRelayData { origin_chain_id, deposit_id });
        }
    }
    Ok(SlowRelayRoot { tree: MerkleTree::new(leaves) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use ethers::types::U256;

    fn unfilled(fixture: &TwoChainFixture, deposit_id: u32, origin_chain_id: u64) -> UnfilledDeposit {
        let mut deposit = fixture.deposit(deposit_id, amount(1000), 150).deposit;
        deposit.origin_chain_id = origin_chain_id;
        UnfilledDeposit {
            deposit,
            unfilled_amount: U256::from(600u64),
            has_first_fill_in_range: true,
        }
    }

    #[test]
    fn leaves_are_ordered_by_origin_chain_then_deposit_id() {
        let fixture = TwoChainFixture::new();
        let deposits = vec![
            unfilled(&fixture, 9, 10),
            unfilled(&fixture, 3, 1),
            unfilled(&fixture, 7, 1),
        ];
        let root = build_slow_relay_root(&deposits).unwrap();
        let keys: Vec<_> = root.leaves().iter().map(RelayData::sort_key).collect();
        assert_eq!(keys, vec![(1, 3), (1, 7), (10, 9)]);
    }

    #[test]
    fn leaf_carries_the_full_deposit_amount() {
        let fixture = TwoChainFixture::new();
        let root = build_slow_relay_root(&[unfilled(&fixture, 7, 1)]).unwrap();
        assert_eq!(root.leaves()[0].amount, amount(1000));
    }

    #[test]
    fn duplicate_identity_fails_loudly() {
        let fixture = TwoChainFixture::new();
        let deposits = vec![unfilled(&fixture, 7, 1), unfilled(&fixture, 7, 1)];
        let result = build_slow_relay_root(&deposits);
        assert!(matches!(
            result,
            Err(Error::DuplicateRelayData { origin_chain_id: 1, deposit_id: 7 })
        ));
    }

    #[test]
    fn empty_input_yields_the_empty_root() {
        let root = build_slow_relay_root(&[]).unwrap();
        assert_eq!(root.tree.root(), dataworker_merkle::empty_merkle_root());
        assert!(root.leaves().is_empty());
    }
}
