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

use dataworker_merkle::MerkleLeaf;
use ethers::types::{Address, I256, U256};

use crate::encode::Encoder;

/// One pool rebalance instruction: how much of each L1 token the HubPool
/// should send to (positive) or pull back from (negative) one SpokePool.
///
/// All inner vectors are index-aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRebalanceLeaf {
    /// Chain the leaf settles.
    pub chain_id: u64,
    /// Per-chain chunk index when a chain's token set exceeds the leaf cap.
    pub group_index: u32,
    /// LP fees accrued per L1 token over the bundle.
    pub bundle_lp_fees: Vec<U256>,
    /// Amount to actually move on-chain per L1 token this bundle.
    pub net_send_amounts: Vec<I256>,
    /// Balance carried forward per L1 token after the transfer threshold
    /// policy.
    pub running_balances: Vec<I256>,
    /// The L1 tokens the other vectors are aligned to.
    pub l1_tokens: Vec<Address>,
    /// Position of the leaf in the tree.
    pub leaf_id: u32,
}

impl MerkleLeaf for PoolRebalanceLeaf {
    fn to_bytes(&self) -> Vec<u8> {
        Encoder::new()
            .u64(self.chain_id)
            .u32(self.group_index)
            .u256_vec(&self.bundle_lp_fees)
            .i256_vec(&self.net_send_amounts)
            .i256_vec(&self.running_balances)
            .address_vec(&self.l1_tokens)
            .u32(self.leaf_id)
            .finish()
    }
}

/// One relayer refund instruction for a SpokePool: reimburse the listed
/// relayers in `l2_token_address` and return `amount_to_return` to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayerRefundLeaf {
    /// Excess liquidity to send back to the HubPool.
    pub amount_to_return: U256,
    /// Chain the leaf executes on.
    pub chain_id: u64,
    /// Refund per relayer, index-aligned with `refund_addresses`.
    pub refund_amounts: Vec<U256>,
    /// Position of the leaf in the tree.
    pub leaf_id: u32,
    /// The token refunds are paid in.
    pub l2_token_address: Address,
    /// The relayers owed a refund.
    pub refund_addresses: Vec<Address>,
}

impl MerkleLeaf for RelayerRefundLeaf {
    fn to_bytes(&self) -> Vec<u8> {
        Encoder::new()
            .u256(self.amount_to_return)
            .u64(self.chain_id)
            .u256_vec(&self.refund_amounts)
            .u32(self.leaf_id)
            .address(self.l2_token_address)
            .address_vec(&self.refund_addresses)
            .finish()
    }
}

/// Construction-time variant of [`RelayerRefundLeaf`].
///
/// Carries the transient `group_index` the final sort needs; the final leaf
/// never exposes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayerRefundLeafBuilder {
    /// Excess liquidity to send back to the HubPool; zero on all but the
    /// first chunk of a group.
    pub amount_to_return: U256,
    /// Chain the leaf executes on.
    pub chain_id: u64,
    /// Refund per relayer, index-aligned with `refund_addresses`.
    pub refund_amounts: Vec<U256>,
    /// The token refunds are paid in.
    pub l2_token_address: Address,
    /// The relayers owed a refund.
    pub refund_addresses: Vec<Address>,
    /// Start offset of this chunk within its group's sorted refund list.
    pub group_index: u32,
}

impl RelayerRefundLeafBuilder {
    /// The key the final leaf order is imposed on.
    pub fn sort_key(&self) -> (u64, Address, u32) {
        (self.chain_id, self.l2_token_address, self.group_index)
    }

    /// Consumes the builder, assigning the traversal-order `leaf_id` and
    /// discarding the transient `group_index`.
    pub fn into_leaf(self, leaf_id: u32) -> RelayerRefundLeaf {
        RelayerRefundLeaf {
            amount_to_return: self.amount_to_return,
            chain_id: self.chain_id,
            refund_amounts: self.refund_amounts,
            leaf_id,
            l2_token_address: self.l2_token_address,
            refund_addresses: self.refund_addresses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_leaf() -> RelayerRefundLeaf {
        RelayerRefundLeaf {
            amount_to_return: U256::from(7u64),
            chain_id: 10,
            refund_amounts: vec![U256::from(100u64), U256::from(50u64)],
            leaf_id: 0,
            l2_token_address: Address::repeat_byte(0xAA),
            refund_addresses: vec![Address::repeat_byte(1), Address::repeat_byte(2)],
        }
    }

    #[test]
    fn encoding_is_deterministic_and_field_sensitive() {
        let leaf = make_leaf();
        assert_eq!(leaf.to_bytes(), make_leaf().to_bytes());

        let mut other = make_leaf();
        other.leaf_id = 1;
        assert_ne!(leaf.to_bytes(), other.to_bytes());
    }

    #[test]
    fn encoding_starts_with_the_zero_pad() {
        let bytes = make_leaf().to_bytes();
        assert!(bytes[..64].iter().all(|b| *b == 0));
        // pad + amount + chain + (len + 2 amounts) + leaf id + token + (len + 2 addresses)
        assert_eq!(bytes.len(), 64 + 32 * 10);
    }

    #[test]
    fn builder_drops_the_group_index() {
        let builder = RelayerRefundLeafBuilder {
            amount_to_return: U256::zero(),
            chain_id: 10,
            refund_amounts: vec![],
            l2_token_address: Address::repeat_byte(0xAA),
            refund_addresses: vec![],
            group_index: 3,
        };
        let leaf = builder.into_leaf(5);
        assert_eq!(leaf.leaf_id, 5);
    }
}
