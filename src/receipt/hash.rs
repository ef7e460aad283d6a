// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Leaf hashing for completed jobs, adapted from the node's proof-generation
//! data hash helper (`sha2::Sha256`) but fed the canonical JSON encoding of
//! the job rather than raw prompt/response bytes.

use super::canonical::canonicalize;
use crate::types::Job;
use serde_json::json;
use sha2::{Digest, Sha256};

/// `leaf(job) = SHA-256(canonical_json(job))`. Only the fields that are
/// permanent once a job reaches a terminal state are hashed.
pub fn leaf_hash(job: &Job) -> [u8; 32] {
    let value = json!({
        "job_id": job.job_id,
        "epoch_id": job.epoch_id,
        "client": job.client,
        "worker": job.worker,
        "kind": job.kind,
        "input_ref": job.input_ref,
        "result_ref": job.result_ref,
        "fee": job.fee.to_string(),
        "poe_hash": job.poe_hash,
        "execution_ms": job.execution_ms,
        "submitted_at": job.submitted_at,
        "completed_at": job.completed_at,
    });
    let canonical = canonicalize(&value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

/// The worker's proof-of-execution hash: `SHA-256(job_id ‖ result_ref ‖ identity)`.
pub fn poe_hash(job_id: &str, result_ref: &str, identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job_id.as_bytes());
    hasher.update(result_ref.as_bytes());
    hasher.update(identity.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cents, JobStatus};

    fn sample_job() -> Job {
        Job {
            job_id: "job-001-0001".to_string(),
            epoch_id: "epoch-001".to_string(),
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
    fn is_deterministic() {
        let job = sample_job();
        assert_eq!(leaf_hash(&job), leaf_hash(&job));
    }

    #[test]
    fn differs_when_result_ref_differs() {
        let mut job_b = sample_job();
        job_b.result_ref = Some("cid-other".to_string());
        assert_ne!(leaf_hash(&sample_job()), leaf_hash(&job_b));
    }

    #[test]
    fn poe_hash_is_deterministic_and_hex() {
        let h = poe_hash("job-001-0001", "cid-out", "w1");
        assert_eq!(h.len(), 64);
        assert_eq!(h, poe_hash("job-001-0001", "cid-out", "w1"));
    }
}
