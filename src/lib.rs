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
//
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Dataworker Crate 🕸️
//!
//! The off-chain bundle-construction and validation core of the cross-chain
//! value-transfer protocol.
//!
//! ## Overview
//!
//! Periodically the dataworker inspects the deposit and fill events indexed
//! from the per-chain SpokePool contracts and the mainnet HubPool, and
//! produces three Merkle-committed artifacts that drive on-chain settlement:
//!
//!   1. A **pool rebalance root**, instructing the HubPool how much of each
//!      token to send to, or pull back from, each SpokePool.
//!   2. A **relayer refund root**, instructing each SpokePool how to
//!      reimburse relayers who fronted liquidity to complete user deposits.
//!   3. A **slow relay root**, listing partially-filled deposits that must be
//!      completed from pool liquidity.
//!
//! The dataworker plays two roles. When no proposal is pending it **proposes**
//! a fresh bundle over the widest block range every chain can support. When a
//! peer's proposal is pending it **validates** the proposal by independently
//! recomputing all three roots over the proposed ranges, disputing on any
//! disagreement and staying quiet when the peer merely appears to be slightly
//! ahead of the local chain heads.
//!
//! All event data is consumed through read-only client snapshots; the
//! dataworker holds no state across cycles and a single failing RPC aborts
//! the whole cycle.

/// A module for assembling bundle data from deposit and fill events.
pub mod bundle_data;
/// The Dataworker itself and the cycle plumbing shared by its two roles.
pub mod dataworker;
/// A module for building the pool rebalance root.
pub mod pool_rebalance;
/// A module for proposing new root bundles.
pub mod propose;
/// A module for building the relayer refund root.
pub mod relayer_refund;
/// A module for building the slow relay root.
pub mod slow_relay;
/// A module for validating pending root bundles.
pub mod validate;

#[cfg(test)]
pub(crate) mod test_utils;

pub use dataworker::Dataworker;
pub use dataworker_utils::{Error, Result};
