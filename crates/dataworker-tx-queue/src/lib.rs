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

//! The TransactionQueue stores HubPool transaction requests so the submission
//! subsystem can process them later. Enqueueing is fire-and-forget and shared
//! across cycles; double submission is safe-but-wasteful because the HubPool
//! rejects duplicate proposals on-chain.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dataworker_utils::{probe, Error, Result};
use ethers::types::H256;

/// The HubPool calls the dataworker can enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubPoolCall {
    /// Propose a new root bundle.
    ProposeRootBundle {
        /// Bundle end block per chain, in evaluation order.
        bundle_evaluation_block_numbers: Vec<u64>,
        /// Number of pool rebalance leaves in the proposal.
        pool_rebalance_leaf_count: u32,
        /// Pool rebalance root.
        pool_rebalance_root: H256,
        /// Relayer refund root.
        relayer_refund_root: H256,
        /// Slow relay root.
        slow_relay_root: H256,
    },
    /// Dispute the currently pending root bundle.
    DisputeRootBundle,
}

/// A HubPool transaction request with its human-readable Markdown log
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    /// The call to submit.
    pub call: HubPoolCall,
    /// Markdown diagnostic attached to the submission log.
    pub markdown: String,
}

/// A cloneable, multi-caller, in-memory transaction queue.
///
/// The dataworker is stateless across cycles; durability is on-chain, so the
/// queue deliberately holds requests in memory only.
#[derive(Debug, Clone, Default)]
pub struct TransactionQueue {
    inner: Arc<Mutex<VecDeque<TransactionRequest>>>,
}

impl TransactionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `request` for later submission.
    pub fn enqueue(&self, request: TransactionRequest) -> Result<()> {
        let mut queue = self
            .inner
            .lock()
            .map_err(|_| Error::Generic("transaction queue mutex poisoned"))?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::TxQueue,
            call = ?request.call,
            enqueued = true,
        );
        queue.push_back(request);
        Ok(())
    }

    /// Takes every queued request, oldest first.
    pub fn drain(&self) -> Vec<TransactionRequest> {
        match self.inner.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of requests waiting in the queue.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueued_requests_drain_in_order() {
        let queue = TransactionQueue::new();
        queue
            .enqueue(TransactionRequest {
                call: HubPoolCall::DisputeRootBundle,
                markdown: "first".into(),
            })
            .unwrap();
        queue
            .enqueue(TransactionRequest {
                call: HubPoolCall::DisputeRootBundle,
                markdown: "second".into(),
            })
            .unwrap();
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained[0].markdown, "first");
        assert_eq!(drained[1].markdown, "second");
        assert!(queue.is_empty());
    }

    #[test]
    fn clones_share_the_same_queue() {
        let queue = TransactionQueue::new();
        let clone = queue.clone();
        clone
            .enqueue(TransactionRequest {
                call: HubPoolCall::DisputeRootBundle,
                markdown: "shared".into(),
            })
            .unwrap();
        assert_eq!(queue.len(), 1);
    }
}
