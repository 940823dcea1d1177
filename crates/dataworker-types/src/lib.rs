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

#![warn(missing_docs)]

//! # Dataworker Types Crate 🕸️
//!
//! The event-level entities (deposits, fills, unfilled remainders), the
//! intermediate accounting maps, and the three settlement leaf types the
//! dataworker commits into Merkle roots.

/// Intermediate accounting maps and bundle-level records.
pub mod bundle;
mod encode;
/// Settlement leaf types and their canonical encodings.
pub mod leaves;
/// Deposit and fill event entities.
pub mod relay;

pub use bundle::{
    BlockRange, FillsToRefund, PendingRootBundle, RealizedLpFees, RefundGroup, RunningBalances,
    TokenInfo,
};
pub use leaves::{PoolRebalanceLeaf, RelayerRefundLeaf, RelayerRefundLeafBuilder};
pub use relay::{Deposit, DepositWithBlock, Fill, FillWithBlock, RelayData, UnfilledDeposit};
