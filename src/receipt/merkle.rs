// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Binary Merkle tree over job leaf hashes with odd-node duplication,
//! proof generation, and verification. The node this codebase was adapted
//! from has no Merkle tree of its own; this module follows the same
//! `sha2`-primitive, struct-per-concept style as the rest of the crate.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: [u8; 32],
    pub side: Side,
}

/// A fully-materialized tree: every level is kept so proofs can be produced
/// for any leaf without recomputation.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<[u8; 32]>>,
}

fn parent_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn empty_root() -> [u8; 32] {
    Sha256::new().finalize().into()
}

impl MerkleTree {
    /// Builds the tree from leaves already in their final (sorted) order.
    /// Callers are responsible for sorting jobs by `job_id` before hashing.
    pub fn build(leaves: Vec<[u8; 32]>) -> Self {
        if leaves.is_empty() {
            return Self {
                levels: vec![vec![empty_root()]],
            };
        }

        let mut levels = vec![leaves];
        while levels.last().expect("levels never empty").len() > 1 {
            let current = levels.last().expect("levels never empty");
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            let mut i = 0;
            while i < current.len() {
                let left = current[i];
                let right = if i + 1 < current.len() { current[i + 1] } else { current[i] };
                next.push(parent_hash(&left, &right));
                i += 2;
            }
            levels.push(next);
        }

        Self { levels }
    }

    pub fn root(&self) -> [u8; 32] {
        *self
            .levels
            .last()
            .and_then(|level| level.first())
            .expect("tree always has a top level")
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(|l| l.len()).unwrap_or(0)
    }

    /// Produces the sibling path for the leaf at `index`, bottom-up.
    pub fn proof(&self, mut index: usize) -> Option<Vec<ProofStep>> {
        if index >= self.leaf_count() {
            return None;
        }
        let mut steps = Vec::new();
        for level in &self.levels[..self.levels.len() - 1] {
            let is_right = index % 2 == 1;
            let sibling_index = if is_right {
                index - 1
            } else if index + 1 < level.len() {
                index + 1
            } else {
                index
            };
            steps.push(ProofStep {
                sibling: level[sibling_index],
                side: if is_right { Side::Left } else { Side::Right },
            });
            index /= 2;
        }
        Some(steps)
    }
}

/// Verifies that `leaf` combined with `proof` folds to `expected_root`.
pub fn verify(leaf: [u8; 32], proof: &[ProofStep], expected_root: [u8; 32]) -> bool {
    let mut current = leaf;
    for step in proof {
        current = match step.side {
            Side::Left => parent_hash(&step.sibling, &current),
            Side::Right => parent_hash(&current, &step.sibling),
        };
    }
    current == expected_root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(byte: u8) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([byte]);
        hasher.finalize().into()
    }

    #[test]
    fn empty_tree_root_is_hash_of_empty_input() {
        let tree = MerkleTree::build(vec![]);
        assert_eq!(tree.root(), empty_root());
    }

    #[test]
    fn single_leaf_tree_root_is_the_leaf() {
        let l = leaf(1);
        let tree = MerkleTree::build(vec![l]);
        assert_eq!(tree.root(), l);
    }

    #[test]
    fn odd_leaf_count_duplicates_last_node() {
        let leaves = vec![leaf(1), leaf(2), leaf(3)];
        let tree = MerkleTree::build(leaves.clone());
        let expected_level1_2 = parent_hash(&leaves[2], &leaves[2]);
        let expected_level1_0 = parent_hash(&leaves[0], &leaves[1]);
        let expected_root = parent_hash(&expected_level1_0, &expected_level1_2);
        assert_eq!(tree.root(), expected_root);
    }

    #[test]
    fn proof_round_trips_through_verify_for_every_leaf() {
        let leaves: Vec<[u8; 32]> = (1..=7u8).map(leaf).collect();
        let tree = MerkleTree::build(leaves.clone());
        let root = tree.root();
        for (i, l) in leaves.iter().enumerate() {
            let proof = tree.proof(i).expect("index in range");
            assert!(verify(*l, &proof, root), "proof for leaf {} failed", i);
        }
    }

    #[test]
    fn verify_rejects_tampered_leaf() {
        let leaves: Vec<[u8; 32]> = (1..=4u8).map(leaf).collect();
        let tree = MerkleTree::build(leaves.clone());
        let root = tree.root();
        let proof = tree.proof(0).unwrap();
        assert!(!verify(leaf(99), &proof, root));
    }

    #[test]
    fn out_of_range_index_has_no_proof() {
        let tree = MerkleTree::build(vec![leaf(1), leaf(2)]);
        assert!(tree.proof(5).is_none());
    }
}
