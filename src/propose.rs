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

//! The proposal controller: when no bundle is pending, build all three roots
//! over the widest legal block range and enqueue a `proposeRootBundle`
//! transaction.

use dataworker_tx_queue::{HubPoolCall, TransactionRequest};
use dataworker_types::BlockRange;
use dataworker_utils::{probe, Result};

use crate::dataworker::{BundleRoots, Dataworker};

impl Dataworker {
    /// Proposes a new root bundle, unless one is already pending or there is
    /// nothing to rebalance.
    pub async fn propose_root_bundle(&self) -> Result<()> {
        if !self.clients.hub_pool.is_updated() {
            return Err(dataworker_utils::Error::ClientNotUpdated { client: "HubPool" });
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Proposal,
            starting = true,
        );
        if self.clients.hub_pool.has_pending_proposal() {
            tracing::info!("a root bundle proposal is already pending, skipping proposal");
            return Ok(());
        }

        let block_ranges = self.widest_possible_block_ranges().await?;
        let end_mainnet_block = self.end_mainnet_block(&block_ranges)?;
        let spoke_pool_clients = self.spoke_pool_clients_at_block(end_mainnet_block).await?;
        let roots = self.build_roots(&block_ranges, &spoke_pool_clients)?;

        if roots.pool_rebalance.leaves().is_empty() {
            tracing::info!("no pool rebalance leaves, nothing to propose");
            return Ok(());
        }

        let call = HubPoolCall::ProposeRootBundle {
            bundle_evaluation_block_numbers: block_ranges.iter().map(|r| r.end).collect(),
            pool_rebalance_leaf_count: roots.pool_rebalance.leaves().len() as u32,
            pool_rebalance_root: roots.pool_rebalance.tree.root(),
            relayer_refund_root: roots.relayer_refund.tree.root(),
            slow_relay_root: roots.slow_relay.tree.root(),
        };
        let markdown = self.propose_markdown(&block_ranges, &roots);
        // An enqueue failure must not take the controller down; the next
        // cycle re-proposes from scratch.
        if let Err(e) = self.tx_queue.enqueue(TransactionRequest { call, markdown }) {
            tracing::error!(error = %e, "failed to enqueue proposeRootBundle transaction");
            return Ok(());
        }

        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Proposal,
            pool_rebalance_leaves = roots.pool_rebalance.leaves().len(),
            relayer_refund_leaves = roots.relayer_refund.leaves().len(),
            slow_relay_leaves = roots.slow_relay.leaves().len(),
            enqueued = true,
        );
        Ok(())
    }

    fn propose_markdown(&self, block_ranges: &[BlockRange], roots: &BundleRoots) -> String {
        let mut markdown = String::from("Proposed new root bundle 🌱\n");
        for (chain_id, range) in self.config.chain_id_list.iter().zip(block_ranges) {
            markdown.push_str(&format!(
                "- chain {}: blocks [{}, {}]\n",
                chain_id, range.start, range.end
            ));
        }
        markdown.push_str(&format!(
            "- pool rebalance root {} ({} leaves)\n",
            roots.pool_rebalance.tree.hex_root(),
            roots.pool_rebalance.leaves().len(),
        ));
        for leaf in roots.pool_rebalance.leaves() {
            let symbols: Vec<String> = leaf
                .l1_tokens
                .iter()
                .map(|token| {
                    self.clients
                        .hub_pool
                        .token_info(self.config.hub_chain_id(), *token)
                        .map(|info| info.symbol)
                        .unwrap_or_else(|_| format!("{token:?}"))
                })
                .collect();
            markdown.push_str(&format!(
                "  - leaf {}: chain {} tokens [{}]\n",
                leaf.leaf_id,
                leaf.chain_id,
                symbols.join(", "),
            ));
        }
        markdown.push_str(&format!(
            "- relayer refund root {} ({} leaves)\n",
            roots.relayer_refund.tree.hex_root(),
            roots.relayer_refund.leaves().len(),
        ));
        markdown.push_str(&format!(
            "- slow relay root {} ({} leaves)\n",
            roots.slow_relay.tree.hex_root(),
            roots.slow_relay.leaves().len(),
        ));
        markdown
    }
}
