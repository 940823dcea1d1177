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

//! keccak256 Merkle trees over settlement leaves.
//!
//! Pair hashing is commutative (the smaller hash goes first), matching the
//! OpenZeppelin `MerkleProof` discipline the on-chain verifiers use, so a
//! proof can be checked without position information. An odd node at any
//! level is promoted unchanged.

use ethers::types::H256;
use ethers::utils::keccak256;

/// A type that can be hashed into a Merkle leaf.
pub trait MerkleLeaf {
    /// The canonical byte encoding of the leaf, as hashed on-chain.
    fn to_bytes(&self) -> Vec<u8>;

    /// keccak256 of the canonical encoding.
    fn hash(&self) -> [u8; 32] {
        keccak256(self.to_bytes())
    }
}

/// The sentinel root marking "no leaves"; on-chain it means no pool rebalance
/// is needed.
pub fn empty_merkle_root() -> H256 {
    H256::zero()
}

/// A Merkle tree over a list of leaves, keeping the leaves alongside the
/// internal layers so proofs can be produced per leaf.
#[derive(Debug, Clone)]
pub struct MerkleTree<L> {
    leaves: Vec<L>,
    layers: Vec<Vec<[u8; 32]>>,
}

impl<L: MerkleLeaf> MerkleTree<L> {
    /// Builds the tree over `leaves` in the given order.
    pub fn new(leaves: Vec<L>) -> Self {
        let mut layers: Vec<Vec<[u8; 32]>> = Vec::new();
        if !leaves.is_empty() {
            let mut layer: Vec<[u8; 32]> = leaves.iter().map(MerkleLeaf::hash).collect();
            layers.push(layer.clone());
            while layer.len() > 1 {
                layer = layer
                    .chunks(2)
                    .map(|pair| match pair {
                        [a, b] => commutative_keccak256(a, b),
                        [a] => *a,
                        _ => unreachable!("chunks(2) yields one or two elements"),
                    })
                    .collect();
                layers.push(layer.clone());
            }
        }
        Self { leaves, layers }
    }

    /// The leaves the tree was built over, in insertion order.
    pub fn leaves(&self) -> &[L] {
        &self.leaves
    }

    /// The Merkle root, or the empty sentinel when the tree has no leaves.
    pub fn root(&self) -> H256 {
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .map(|root| H256::from(*root))
            .unwrap_or_else(empty_merkle_root)
    }

    /// The root rendered as a 0x-prefixed hex string.
    pub fn hex_root(&self) -> String {
        format!("{:?}", self.root())
    }

    /// The proof for the leaf at `index`, bottom-up. `None` if out of range.
    pub fn proof(&self, index: usize) -> Option<Vec<[u8; 32]>> {
        if index >= self.leaves.len() {
            return None;
        }
        let mut proof = Vec::new();
        let mut position = index;
        for layer in &self.layers[..self.layers.len().saturating_sub(1)] {
            let sibling = position ^ 1;
            if let Some(hash) = layer.get(sibling) {
                proof.push(*hash);
            }
            position /= 2;
        }
        Some(proof)
    }

    /// The proof for the first leaf equal to `leaf`.
    pub fn proof_for(&self, leaf: &L) -> Option<Vec<[u8; 32]>>
    where
        L: PartialEq,
    {
        let index = self.leaves.iter().position(|l| l == leaf)?;
        self.proof(index)
    }
}

/// Recomputes the root from `leaf` and `proof` and compares it to `root`.
pub fn verify_proof(root: H256, leaf: [u8; 32], proof: &[[u8; 32]]) -> bool {
    process_proof(proof, &leaf) == root.to_fixed_bytes()
}

fn process_proof(proof: &[[u8; 32]], leaf: &[u8; 32]) -> [u8; 32] {
    let mut computed_hash = *leaf;
    for proof_element in proof {
        computed_hash = commutative_keccak256(&computed_hash, proof_element);
    }
    computed_hash
}

fn commutative_keccak256(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    if a < b {
        efficient_keccak256(a, b)
    } else {
        efficient_keccak256(b, a)
    }
}

fn efficient_keccak256(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut input = [0u8; 64];
    input[..32].copy_from_slice(a);
    input[32..].copy_from_slice(b);
    keccak256(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Bytes(Vec<u8>);

    impl MerkleLeaf for Bytes {
        fn to_bytes(&self) -> Vec<u8> {
            self.0.clone()
        }
    }

    fn make_leaves(n: u8) -> Vec<Bytes> {
        (0..n).map(|i| Bytes(vec![i; 8])).collect()
    }

    #[test]
    fn empty_tree_has_the_sentinel_root() {
        let tree = MerkleTree::<Bytes>::new(vec![]);
        assert_eq!(tree.root(), empty_merkle_root());
        assert!(tree.proof(0).is_none());
    }

    #[test]
    fn identical_leaf_lists_yield_identical_roots() {
        let a = MerkleTree::new(make_leaves(7));
        let b = MerkleTree::new(make_leaves(7));
        assert_eq!(a.root(), b.root());
        assert_ne!(a.root(), MerkleTree::new(make_leaves(6)).root());
    }

    #[test]
    fn every_proof_verifies_against_the_root() {
        for n in 1..=9u8 {
            let leaves = make_leaves(n);
            let tree = MerkleTree::new(leaves.clone());
            for (i, leaf) in leaves.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert!(verify_proof(tree.root(), leaf.hash(), &proof), "leaf {i} of {n}");
            }
        }
    }

    #[test]
    fn a_tampered_leaf_fails_verification() {
        let tree = MerkleTree::new(make_leaves(4));
        let proof = tree.proof(1).unwrap();
        let bogus = Bytes(vec![0xAA; 8]);
        assert!(!verify_proof(tree.root(), bogus.hash(), &proof));
    }

    #[test]
    fn proof_for_finds_the_leaf_by_value() {
        let leaves = make_leaves(5);
        let tree = MerkleTree::new(leaves.clone());
        let proof = tree.proof_for(&leaves[3]).unwrap();
        assert_eq!(proof, tree.proof(3).unwrap());
    }

    #[test]
    fn single_leaf_root_is_the_leaf_hash() {
        let leaves = make_leaves(1);
        let tree = MerkleTree::new(leaves.clone());
        assert_eq!(tree.root(), H256::from(leaves[0].hash()));
        assert!(tree.proof(0).unwrap().is_empty());
    }
}
