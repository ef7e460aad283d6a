// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Pure, stateless, reentrant Merkle-receipt core shared by the Controller,
//! the Ledger, and any third party auditing a sealed epoch. No I/O, no
//! locks: every function here is a deterministic transform over its inputs.

pub mod canonical;
pub mod hash;
pub mod merkle;
pub mod message;

pub use hash::{leaf_hash, poe_hash};
pub use merkle::{MerkleTree, ProofStep, Side};

use crate::types::{Cents, Job};
use serde::{Deserialize, Serialize};

/// On-wire receipt format, key order fixed per the external interface
/// contract: `receipt_version, job_id, epoch_id, client, agent, job_type,
/// price, currency, timing, leaf_hash, jobs_merkle_root, merkle_proof,
/// epoch_signature_ref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_version: u32,
    pub job_id: String,
    pub epoch_id: String,
    pub client: String,
    pub agent: String,
    pub job_type: String,
    pub price: String,
    pub currency: String,
    pub timing: ReceiptTiming,
    pub leaf_hash: String,
    pub jobs_merkle_root: String,
    pub merkle_proof: Vec<MerkleProofEntry>,
    pub epoch_signature_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptTiming {
    pub submitted_utc: i64,
    pub started_utc: Option<i64>,
    pub completed_utc: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProofEntry {
    pub hash: String,
    pub position: String,
}

const RECEIPT_VERSION: u32 = 1;
const CURRENCY: &str = "USD";

/// Sorts jobs by `job_id` and builds the level-by-level Merkle tree over
/// their leaf hashes, per the tree-construction algorithm.
pub fn build_tree(jobs: &[Job]) -> (Vec<Job>, MerkleTree) {
    let mut sorted = jobs.to_vec();
    sorted.sort_by(|a, b| a.job_id.cmp(&b.job_id));
    let leaves: Vec<[u8; 32]> = sorted.iter().map(leaf_hash).collect();
    let tree = MerkleTree::build(leaves);
    (sorted, tree)
}

/// Produces the on-wire receipt for `job`'s position `index` in the
/// already-sorted `sorted_jobs` / `tree` pair returned by `build_tree`.
pub fn make_receipt(
    job: &Job,
    index: usize,
    tree: &MerkleTree,
    epoch_signature_ref: Option<String>,
) -> Option<Receipt> {
    let proof = tree.proof(index)?;
    let leaf = leaf_hash(job);
    Some(Receipt {
        receipt_version: RECEIPT_VERSION,
        job_id: job.job_id.clone(),
        epoch_id: job.epoch_id.clone(),
        client: job.client.clone(),
        agent: job.worker.clone().unwrap_or_default(),
        job_type: job.kind.clone(),
        price: job.fee.to_string(),
        currency: CURRENCY.to_string(),
        timing: ReceiptTiming {
            submitted_utc: job.submitted_at,
            started_utc: job.started_at,
            completed_utc: job.completed_at,
        },
        leaf_hash: hex::encode(leaf),
        jobs_merkle_root: hex::encode(tree.root()),
        merkle_proof: proof
            .into_iter()
            .map(|step| MerkleProofEntry {
                hash: hex::encode(step.sibling),
                position: match step.side {
                    Side::Left => "left".to_string(),
                    Side::Right => "right".to_string(),
                },
            })
            .collect(),
        epoch_signature_ref,
    })
}

/// Verifies a receipt against an externally-known root, decoding its hex
/// fields and re-running the fold described by the verification algorithm.
pub fn verify_receipt(receipt: &Receipt, expected_root_hex: &str) -> bool {
    let leaf = match decode_hash(&receipt.leaf_hash) {
        Some(h) => h,
        None => return false,
    };
    let expected_root = match decode_hash(expected_root_hex) {
        Some(h) => h,
        None => return false,
    };
    let steps: Option<Vec<ProofStep>> = receipt
        .merkle_proof
        .iter()
        .map(|entry| {
            let sibling = decode_hash(&entry.hash)?;
            let side = match entry.position.as_str() {
                "left" => Side::Left,
                "right" => Side::Right,
                _ => return None,
            };
            Some(ProofStep { sibling, side })
        })
        .collect();
    match steps {
        Some(steps) => merkle::verify(leaf, &steps, expected_root),
        None => false,
    }
}

fn decode_hash(hex_str: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}

/// Formats an epoch's distributed amount the way the seal message expects.
pub fn format_amount(cents: Cents) -> String {
    cents.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cents, EpochId, JobStatus};

    fn job(id: &str, epoch: EpochId) -> Job {
        Job {
            job_id: id.to_string(),
            epoch_id: epoch,
            client: "xyz.example".to_string(),
            worker: Some("w1".to_string()),
            kind: "spine-mri".to_string(),
            input_ref: "cid-in".to_string(),
            result_ref: Some("cid-out".to_string()),
            fee: Cents::from_dollars(0.10),
            status: JobStatus::Completed,
            poe_hash: Some("deadbeef".to_string()),
            execution_ms: Some(1200),
            submitted_at: 1_700_000_000,
            started_at: Some(1_700_000_001),
            completed_at: Some(1_700_000_005),
        }
    }

    #[test]
    fn build_tree_sorts_regardless_of_input_order() {
        let jobs = vec![job("job-001-0002", "epoch-001".to_string()), job("job-001-0001", "epoch-001".to_string())];
        let (sorted, _) = build_tree(&jobs);
        assert_eq!(sorted[0].job_id, "job-001-0001");
        assert_eq!(sorted[1].job_id, "job-001-0002");
    }

    #[test]
    fn receipt_verifies_against_its_own_tree() {
        let jobs = vec![
            job("job-001-0001", "epoch-001".to_string()),
            job("job-001-0002", "epoch-001".to_string()),
            job("job-001-0003", "epoch-001".to_string()),
        ];
        let (sorted, tree) = build_tree(&jobs);
        let root_hex = hex::encode(tree.root());
        for (i, j) in sorted.iter().enumerate() {
            let receipt = make_receipt(j, i, &tree, Some("sig-ref".to_string())).unwrap();
            assert!(verify_receipt(&receipt, &root_hex));
        }
    }

    #[test]
    fn receipt_fails_against_wrong_root() {
        let jobs = vec![job("job-001-0001", "epoch-001".to_string())];
        let (sorted, tree) = build_tree(&jobs);
        let receipt = make_receipt(&sorted[0], 0, &tree, None).unwrap();
        assert!(!verify_receipt(&receipt, &"00".repeat(32)));
    }
}
