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

use std::ops::Deref;

use dataworker_merkle::MerkleLeaf;
use ethers::types::{Address, I256, U256};

use crate::encode::Encoder;

/// A user deposit recorded by an origin-chain SpokePool.
///
/// Identity is `(origin_chain_id, deposit_id)`; the event source enforces
/// global uniqueness of that pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    /// Sequential id assigned by the origin SpokePool.
    pub deposit_id: u32,
    /// Chain the deposit was made on.
    pub origin_chain_id: u64,
    /// Chain the depositor wants funds delivered on.
    pub destination_chain_id: u64,
    /// Account that made the deposit.
    pub depositor: Address,
    /// Account to receive funds on the destination chain.
    pub recipient: Address,
    /// Token locked on the origin chain.
    pub origin_token: Address,
    /// Token to deliver on the destination chain.
    pub destination_token: Address,
    /// Deposited amount.
    pub amount: U256,
    /// Relayer fee percentage, fixed-point 1e18, may be negative.
    pub relayer_fee_pct: I256,
    /// LP fee percentage realized at quote time, fixed-point 1e18.
    pub realized_lp_fee_pct: I256,
    /// Timestamp the deposit fees were quoted at.
    pub quote_timestamp: u32,
}

/// A [`Deposit`] together with its origin-chain block coordinates and the
/// mainnet block its quote timestamp resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositWithBlock {
    /// The deposit itself.
    pub deposit: Deposit,
    /// Origin-chain block the deposit event landed in.
    pub block_number: u64,
    /// Mainnet block the quote timestamp maps to; deposit fees were priced
    /// against protocol state at this block.
    pub quote_block_number: u64,
}

impl Deref for DepositWithBlock {
    type Target = Deposit;

    fn deref(&self) -> &Self::Target {
        &self.deposit
    }
}

/// A relayer's (or the pool's) delivery of funds against a deposit, recorded
/// by the destination-chain SpokePool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    /// Deposit id this fill executes against.
    pub deposit_id: u32,
    /// Origin chain of the deposit.
    pub origin_chain_id: u64,
    /// Destination chain the fill happened on.
    pub destination_chain_id: u64,
    /// Depositor copied from the relay data.
    pub depositor: Address,
    /// Recipient copied from the relay data.
    pub recipient: Address,
    /// Token delivered on the destination chain.
    pub destination_token: Address,
    /// Full deposit amount.
    pub amount: U256,
    /// Relayer fee percentage, fixed-point 1e18.
    pub relayer_fee_pct: I256,
    /// Realized LP fee percentage, fixed-point 1e18.
    pub realized_lp_fee_pct: I256,
    /// Amount delivered by this fill.
    pub fill_amount: U256,
    /// Cumulative amount filled for the deposit after this fill.
    pub total_filled_amount: U256,
    /// Chain the relayer elected to be refunded on.
    pub repayment_chain_id: u64,
    /// The relayer that sent the fill.
    pub relayer: Address,
    /// Whether the fill was paid from pool liquidity (a slow relay).
    pub is_slow_relay: bool,
}

impl Fill {
    /// Whether this is the first fill ever sent for its deposit.
    pub fn is_first_fill(&self) -> bool {
        self.fill_amount == self.total_filled_amount
    }

    /// Whether this fill completes its deposit.
    pub fn fills_deposit_completely(&self) -> bool {
        self.total_filled_amount == self.amount
    }

    /// Whether the fill's relay fields agree with `deposit`. A fill that does
    /// not match the deposit it references was forged or corrupted and must
    /// never influence a root.
    pub fn matches_deposit(&self, deposit: &Deposit) -> bool {
        self.deposit_id == deposit.deposit_id
            && self.origin_chain_id == deposit.origin_chain_id
            && self.destination_chain_id == deposit.destination_chain_id
            && self.depositor == deposit.depositor
            && self.recipient == deposit.recipient
            && self.destination_token == deposit.destination_token
            && self.amount == deposit.amount
            && self.relayer_fee_pct == deposit.relayer_fee_pct
            && self.realized_lp_fee_pct == deposit.realized_lp_fee_pct
    }
}

/// A [`Fill`] together with its destination-chain block coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillWithBlock {
    /// The fill itself.
    pub fill: Fill,
    /// Destination-chain block the fill event landed in.
    pub block_number: u64,
    /// Transaction index within the block.
    pub transaction_index: u64,
    /// Log index within the transaction.
    pub log_index: u64,
}

impl FillWithBlock {
    /// Totally orders fills by destination-chain coordinates.
    pub fn block_coordinates(&self) -> (u64, u64, u64) {
        (self.block_number, self.transaction_index, self.log_index)
    }
}

impl Deref for FillWithBlock {
    type Target = Fill;

    fn deref(&self) -> &Self::Target {
        &self.fill
    }
}

/// A deposit with a positive unfilled remainder at the end of the bundle
/// range, eligible for a slow relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfilledDeposit {
    /// The deposit awaiting completion.
    pub deposit: Deposit,
    /// `amount - max(total_filled_amount)` over the deposit's fills.
    pub unfilled_amount: U256,
    /// Whether the deposit's first-ever fill landed inside the bundle range.
    pub has_first_fill_in_range: bool,
}

/// The nine relay fields consumed on-chain when executing a slow relay leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayData {
    /// Account that made the deposit.
    pub depositor: Address,
    /// Account to receive funds.
    pub recipient: Address,
    /// Token to deliver on the destination chain.
    pub destination_token: Address,
    /// Full deposit amount; the contract pays out the unfilled portion.
    pub amount: U256,
    /// Origin chain of the deposit.
    pub origin_chain_id: u64,
    /// Destination chain of the deposit.
    pub destination_chain_id: u64,
    /// Realized LP fee percentage, fixed-point 1e18.
    pub realized_lp_fee_pct: I256,
    /// Relayer fee percentage, fixed-point 1e18.
    pub relayer_fee_pct: I256,
    /// Deposit id, unique per origin chain.
    pub deposit_id: u32,
}

impl RelayData {
    /// Projects a deposit into its on-chain relay data.
    pub fn from_deposit(deposit: &Deposit) -> Self {
        Self {
            depositor: deposit.depositor,
            recipient: deposit.recipient,
            destination_token: deposit.destination_token,
            amount: deposit.amount,
            origin_chain_id: deposit.origin_chain_id,
            destination_chain_id: deposit.destination_chain_id,
            realized_lp_fee_pct: deposit.realized_lp_fee_pct,
            relayer_fee_pct: deposit.relayer_fee_pct,
            deposit_id: deposit.deposit_id,
        }
    }

    /// The key the slow relay root is ordered by.
    pub fn sort_key(&self) -> (u64, u32) {
        (self.origin_chain_id, self.deposit_id)
    }
}

impl MerkleLeaf for RelayData {
    fn to_bytes(&self) -> Vec<u8> {
        Encoder::new()
            .address(self.depositor)
            .address(self.recipient)
            .address(self.destination_token)
            .u256(self.amount)
            .u64(self.origin_chain_id)
            .u64(self.destination_chain_id)
            .i256(self.realized_lp_fee_pct)
            .i256(self.relayer_fee_pct)
            .u32(self.deposit_id)
            .finish()
    }
}
