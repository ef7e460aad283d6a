// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Writes the persisted epoch bundle to the abstract CAS: `SUMMARY.json`,
//! `jobs.json`, `agents.json`, `SIGNATURE.txt`, following the CAS-write
//! helper pattern used to persist inference results elsewhere in this
//! codebase but packaging the whole directory as one JSON envelope, since
//! the abstract `ContentStore` trait addresses single byte blobs rather
//! than a filesystem tree.

use crate::cas::ContentStore;
use crate::types::{Cid, Cents, EpochId, Job};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettlement {
    pub worker: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochBundle {
    pub summary: EpochSummary,
    pub jobs: Vec<Job>,
    pub agents: Vec<AgentSettlement>,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch_id: EpochId,
    pub jobs_count: u64,
    pub total_revenue: String,
    pub merkle_root: String,
    pub sealed_at: i64,
}

impl EpochBundle {
    pub fn new(
        epoch_id: EpochId,
        mut jobs: Vec<Job>,
        settlements: Vec<(String, Cents)>,
        merkle_root: String,
        signature: String,
        sealed_at: i64,
    ) -> Self {
        jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        let total_revenue: i64 = jobs.iter().map(|j| j.fee.0).sum();
        let jobs_count = jobs.len() as u64;
        Self {
            summary: EpochSummary {
                epoch_id,
                jobs_count,
                total_revenue: Cents(total_revenue).to_string(),
                merkle_root,
                sealed_at,
            },
            jobs,
            agents: settlements
                .into_iter()
                .map(|(worker, amount)| AgentSettlement { worker, amount: amount.to_string() })
                .collect(),
            signature,
        }
    }
}

/// Serializes the bundle as a single deterministic JSON blob and writes it
/// to the CAS, returning the handle recorded on the Epoch record.
pub async fn persist_bundle(store: &dyn ContentStore, bundle: &EpochBundle) -> anyhow::Result<Cid> {
    let value = serde_json::to_value(bundle)?;
    let canonical = crate::receipt::canonical::canonicalize(&value);
    store.put(canonical.into_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cas::InMemoryStore;
    use crate::types::{AccountId, Cents as CentsT, JobStatus};

    fn job(id: &str) -> Job {
        Job {
            job_id: id.to_string(),
            epoch_id: "epoch-001".to_string(),
            client: "xyz.example".to_string(),
            worker: Some("w1".to_string()),
            kind: "spine-mri".to_string(),
            input_ref: "cid-in".to_string(),
            result_ref: Some("cid-out".to_string()),
            fee: CentsT::from_dollars(0.10),
            status: JobStatus::Completed,
            poe_hash: Some("deadbeef".to_string()),
            execution_ms: Some(1200),
            submitted_at: 0,
            started_at: Some(1),
            completed_at: Some(2),
        }
    }

    #[tokio::test]
    async fn persisted_bundle_round_trips_through_cas() {
        let store = InMemoryStore::new();
        let bundle = EpochBundle::new(
            "epoch-001".to_string(),
            vec![job("job-001-0002"), job("job-001-0001")],
            vec![("w1".to_string() as AccountId, CentsT::from_dollars(0.07))],
            "a".repeat(64),
            "sig".to_string(),
            100,
        );
        assert_eq!(bundle.jobs[0].job_id, "job-001-0001");

        let cid = persist_bundle(&store, &bundle).await.unwrap();
        let bytes = store.get(&cid).await.unwrap();
        let round_tripped: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(round_tripped["summary"]["jobs_count"], 2);
    }
}
