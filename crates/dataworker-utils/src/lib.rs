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

use ethers::types::Address;

/// Checked fixed-point and 256-bit arithmetic helpers.
pub mod math;
/// A module used for debugging dataworker lifecycle, proposal and validation state.
pub mod probe;

/// An enum of all possible errors that could be encountered during the execution of the
/// Dataworker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// A required client was consulted before it finished updating.
    #[error("{} client is not updated", client)]
    ClientNotUpdated {
        /// Human readable name of the client (HubPool, ConfigStore, SpokePool).
        client: &'static str,
    },
    /// The supplied block range list does not line up with the chain-id evaluation order.
    #[error("Block range length {} does not match chain list length {}", got, expected)]
    BlockRangeLengthMismatch {
        /// Number of chains in the evaluation order.
        expected: usize,
        /// Number of block ranges supplied.
        got: usize,
    },
    /// Chain is not part of the configured evaluation order.
    #[error("Chain Not Found: {}", chain_id)]
    ChainNotFound {
        /// The chain id of the chain.
        chain_id: u64,
    },
    /// No SpokePool client was constructed for the chain.
    #[error("SpokePool client Not Found for chain: {}", chain_id)]
    SpokePoolClientNotFound {
        /// The chain id of the chain.
        chain_id: u64,
    },
    /// Two refund recipients compared equal while sorting a refund group.
    #[error("Duplicate refund address while sorting refunds: {:?}", _0)]
    DuplicateRefundAddress(Address),
    /// Two relayer refund leaves compared equal on (chain, token, group).
    #[error(
        "Duplicate relayer refund leaf key: chain {} token {:?} group {}",
        chain_id,
        l2_token,
        group_index
    )]
    DuplicateRefundLeafKey {
        /// Repayment chain of the colliding leaves.
        chain_id: u64,
        /// L2 token of the colliding leaves.
        l2_token: Address,
        /// Transient group index of the colliding leaves.
        group_index: u32,
    },
    /// Two slow relay leaves compared equal on (origin chain, deposit id).
    #[error("Duplicate relay data: origin chain {} deposit id {}", origin_chain_id, deposit_id)]
    DuplicateRelayData {
        /// Origin chain of the colliding deposits.
        origin_chain_id: u64,
        /// Deposit id of the colliding deposits.
        deposit_id: u32,
    },
    /// The HubPool has no token mapping for the requested (chain, token) pair.
    #[error("No token mapping for token {:?} on chain {}", token, chain_id)]
    TokenMappingNotFound {
        /// The chain the mapping was requested for.
        chain_id: u64,
        /// The token the mapping was requested for.
        token: Address,
    },
    /// No SpokePool deployment is known for the chain at the requested block.
    #[error("No SpokePool deployment for chain {} at mainnet block {}", chain_id, block)]
    SpokePoolNotFound {
        /// The chain the deployment was requested for.
        chain_id: u64,
        /// The mainnet block the lookup was pinned at.
        block: u64,
    },
    /// Error in an underlying chain RPC provider.
    #[error("Provider error: {}", _0)]
    Provider(String),
    /// A checked 256-bit arithmetic operation failed.
    #[error("Arithmetic error: {}", _0)]
    Arithmetic(&'static str),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
}

/// A type alias for the result for the dataworker, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;
