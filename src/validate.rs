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

//! The validation controller: check a pending proposal's block-range shape
//! and end-block discipline, rebuild the three roots over the proposed
//! ranges, and dispute on any disagreement.
//!
//! End blocks slightly ahead of the locally observed heads are not disputed:
//! within the configured per-chain buffer the peer may simply be ahead of our
//! RPC view, so the decision is deferred to a later cycle.

use dataworker_merkle::empty_merkle_root;
use dataworker_tx_queue::{HubPoolCall, TransactionRequest};
use dataworker_types::{BlockRange, PendingRootBundle};
use dataworker_utils::{probe, Error, Result};

use crate::dataworker::Dataworker;

/// The decision reached for a pending proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Nothing is pending; quiet return.
    NoPendingProposal,
    /// The challenge window already expired; the proposal is executable and
    /// disputing would be pointless.
    ChallengeWindowExpired,
    /// The proposal failed a check and a dispute was enqueued.
    Disputed {
        /// The human-readable reason cited in the dispute Markdown.
        reason: String,
    },
    /// End blocks run ahead of the local heads but within the buffer; the
    /// peer may simply be ahead, so no action was taken.
    Deferred,
    /// The recomputed roots match the proposal.
    Accepted,
}

impl Dataworker {
    /// Validates the pending root bundle proposal, if any.
    pub async fn validate_pending_root_bundle(&self) -> Result<ValidationOutcome> {
        if !self.clients.hub_pool.is_updated() {
            return Err(Error::ClientNotUpdated { client: "HubPool" });
        }
        let Some(pending) = self.clients.hub_pool.pending_root_bundle() else {
            return Ok(ValidationOutcome::NoPendingProposal);
        };
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Validation,
            proposer = ?pending.proposer,
            challenge_period_end = pending.challenge_period_end_timestamp,
        );

        if self.clients.hub_pool.current_time() > pending.challenge_period_end_timestamp {
            tracing::debug!("pending proposal's challenge period already expired");
            return Ok(ValidationOutcome::ChallengeWindowExpired);
        }

        // No valid bundle ever commits the empty pool rebalance root.
        if pending.pool_rebalance_root == empty_merkle_root() {
            return self.dispute("Empty pool rebalance root, submitting dispute", &pending);
        }

        let expected = self.widest_possible_block_ranges().await?;
        if pending.bundle_evaluation_block_numbers.len() != expected.len() {
            return self.dispute("Unexpected bundle block range length, disputing", &pending);
        }
        for (end_block, expected_range) in
            pending.bundle_evaluation_block_numbers.iter().zip(&expected)
        {
            if *end_block < expected_range.start {
                return self.dispute("A bundle end block is below the expected start block", &pending);
            }
        }
        for (chain_id, (end_block, expected_range)) in self
            .config
            .chain_id_list
            .iter()
            .zip(pending.bundle_evaluation_block_numbers.iter().zip(&expected))
        {
            let buffer = self.config.end_block_buffer_for(*chain_id);
            if *end_block > expected_range.end + buffer {
                return self.dispute(
                    "A bundle end block is over the max allowed ahead of the local head",
                    &pending,
                );
            }
        }
        let within_buffer = pending
            .bundle_evaluation_block_numbers
            .iter()
            .zip(&expected)
            .any(|(end_block, expected_range)| *end_block > expected_range.end);
        if within_buffer {
            tracing::debug!("pending end blocks run ahead within the buffer, deferring");
            return Ok(ValidationOutcome::Deferred);
        }

        // Rebuild at [expected start, pending end] per chain.
        let block_ranges: Vec<BlockRange> = expected
            .iter()
            .zip(&pending.bundle_evaluation_block_numbers)
            .map(|(expected_range, end_block)| BlockRange::new(expected_range.start, *end_block))
            .collect();
        let end_mainnet_block = self.end_mainnet_block(&block_ranges)?;
        let spoke_pool_clients = self.spoke_pool_clients_at_block(end_mainnet_block).await?;
        let roots = self.build_roots(&block_ranges, &spoke_pool_clients)?;

        if roots.pool_rebalance.tree.root() != pending.pool_rebalance_root {
            return self.dispute("Unexpected pool rebalance root", &pending);
        }
        if roots.pool_rebalance.leaves().len() as u32 != pending.unclaimed_pool_rebalance_leaf_count
        {
            return self.dispute("Unexpected pool rebalance leaf count", &pending);
        }
        if roots.relayer_refund.tree.root() != pending.relayer_refund_root {
            return self.dispute("Unexpected relayer refund root", &pending);
        }
        if roots.slow_relay.tree.root() != pending.slow_relay_root {
            return self.dispute("Unexpected slow relay root", &pending);
        }

        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Validation,
            accepted = true,
        );
        Ok(ValidationOutcome::Accepted)
    }

    fn dispute(&self, reason: &str, pending: &PendingRootBundle) -> Result<ValidationOutcome> {
        let markdown = dispute_markdown(reason, pending);
        tracing::warn!(reason, proposer = ?pending.proposer, "disputing pending root bundle");
        // An enqueue failure must not take the controller down; the outcome
        // still records the dispute decision.
        if let Err(e) = self
            .tx_queue
            .enqueue(TransactionRequest { call: HubPoolCall::DisputeRootBundle, markdown })
        {
            tracing::error!(error = %e, "failed to enqueue disputeRootBundle transaction");
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Validation,
            disputed = true,
        );
        Ok(ValidationOutcome::Disputed { reason: reason.to_string() })
    }
}

fn dispute_markdown(reason: &str, pending: &PendingRootBundle) -> String {
    format!(
        "Disputed pending root bundle ⚔️\n\
         - reason: {}\n\
         - proposer: {:?}\n\
         - pool rebalance root: {:?}\n\
         - relayer refund root: {:?}\n\
         - slow relay root: {:?}\n\
         - end blocks: {:?}\n",
        reason,
        pending.proposer,
        pending.pool_rebalance_root,
        pending.relayer_refund_root,
        pending.slow_relay_root,
        pending.bundle_evaluation_block_numbers,
    )
}
