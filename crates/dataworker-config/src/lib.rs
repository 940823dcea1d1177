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

//! # Dataworker Configuration Module 🕸️
//!
//! A module for configuring the dataworker.
//!
//! ## Overview
//!
//! The dataworker runs against one immutable [`DataworkerConfig`] record: the
//! fixed chain-id evaluation order plus optional overrides for the leaf caps,
//! per-token transfer thresholds and per-chain end-block buffers that
//! otherwise come from the on-chain configuration store. Configuration can be
//! loaded from a TOML or JSON file with a `DATAWORKER`-prefixed environment
//! overlay.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, File};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// The default chain-id evaluation order: mainnet first, then the supported
/// L2s. The HubPool lives on the first chain of the list.
fn default_chain_id_list() -> Vec<u64> {
    vec![1, 10, 137, 288, 42161]
}

/// DataworkerConfig is the configuration for the dataworker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DataworkerConfig {
    /// The fixed chain-id evaluation order. Block range lists and proposal
    /// end-block vectors are always indexed by this list; the first entry is
    /// the hub (mainnet) chain.
    #[serde(default = "default_chain_id_list")]
    pub chain_id_list: Vec<u64>,
    /// Overrides the ConfigStore's maximum refund count per relayer refund
    /// leaf.
    #[serde(default)]
    pub max_refund_count_override: Option<u32>,
    /// Overrides the ConfigStore's maximum L1 token count per pool rebalance
    /// leaf.
    #[serde(default)]
    pub max_l1_token_count_override: Option<u32>,
    /// Per-L1-token transfer threshold overrides.
    #[serde(default)]
    pub token_transfer_threshold_overrides: HashMap<Address, U256>,
    /// Per-chain slack allowed between a pending proposal's end block and the
    /// locally observed head before the proposal is disputed.
    #[serde(default)]
    pub block_range_end_block_buffers: HashMap<u64, u64>,
}

impl Default for DataworkerConfig {
    fn default() -> Self {
        Self {
            chain_id_list: default_chain_id_list(),
            max_refund_count_override: None,
            max_l1_token_count_override: None,
            token_transfer_threshold_overrides: HashMap::new(),
            block_range_end_block_buffers: HashMap::new(),
        }
    }
}

impl DataworkerConfig {
    /// Makes sure that the config is valid, by going through the whole config
    /// and doing some basic checks.
    pub fn verify(&self) -> dataworker_utils::Result<()> {
        if self.chain_id_list.is_empty() {
            return Err(dataworker_utils::Error::Generic("chain-id-list must not be empty"));
        }
        let mut seen = std::collections::HashSet::new();
        for chain_id in &self.chain_id_list {
            if !seen.insert(chain_id) {
                return Err(dataworker_utils::Error::Generic(
                    "chain-id-list must not contain duplicates",
                ));
            }
        }
        Ok(())
    }

    /// The hub (mainnet) chain, by convention the first of the list.
    pub fn hub_chain_id(&self) -> u64 {
        self.chain_id_list[0]
    }

    /// The position of `chain_id` in the evaluation order.
    pub fn chain_index(&self, chain_id: u64) -> dataworker_utils::Result<usize> {
        self.chain_id_list
            .iter()
            .position(|id| *id == chain_id)
            .ok_or(dataworker_utils::Error::ChainNotFound { chain_id })
    }

    /// The end-block buffer for `chain_id`, zero unless configured.
    pub fn end_block_buffer_for(&self, chain_id: u64) -> u64 {
        self.block_range_end_block_buffers.get(&chain_id).copied().unwrap_or(0)
    }
}

/// Try to parse the [`DataworkerConfig`] from the given config file, merging
/// in the environment (with a prefix of DATAWORKER).
pub fn load<P: AsRef<Path>>(path: P) -> dataworker_utils::Result<DataworkerConfig> {
    tracing::trace!("Loading config file: {}", path.as_ref().display());
    let builder = Config::builder()
        .add_source(File::from(path.as_ref()))
        .add_source(config::Environment::with_prefix("DATAWORKER").separator("_"));
    let cfg = builder.build()?;
    let config: Result<DataworkerConfig, serde_path_to_error::Error<config::ConfigError>> =
        serde_path_to_error::deserialize(cfg);
    match config {
        Ok(config) => {
            config.verify()?;
            Ok(config)
        }
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}
