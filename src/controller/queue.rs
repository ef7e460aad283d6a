// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The ordered job queue: priority-then-FIFO via a binary heap wrapper,
//! generalized from the payment-priority queue wrapper elsewhere in this
//! codebase so ties break by `enqueued_at` rather than being undefined, and
//! with atomic claim (remove from pending, insert into processing under a
//! single lock acquisition).

use crate::types::{JobId, QueuedJob};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct HeapEntry {
    job: QueuedJob,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.job.job_id == other.job.job_id
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; higher priority and earlier enqueued_at
        // should pop first, so invert enqueued_at's natural ordering.
        self.job
            .priority
            .cmp(&other.job.priority)
            .then_with(|| other.job.enqueued_at.cmp(&self.job.enqueued_at))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub struct ClaimRecord {
    pub job: QueuedJob,
    pub worker: crate::types::AccountId,
    pub claimed_at: i64,
}

/// Shared between all request handlers; every mutating method takes the
/// single internal lock for the duration of its critical section.
#[derive(Default)]
pub struct JobQueue {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    pending: BinaryHeap<HeapEntry>,
    processing: HashMap<JobId, ClaimRecord>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, job: QueuedJob) {
        let mut inner = self.inner.lock().await;
        inner.pending.push(HeapEntry { job });
    }

    /// Atomically pops the highest-priority pending job (if any) and moves
    /// it into the processing set under `worker`. Two concurrent callers
    /// never receive the same job.
    pub async fn claim(&self, worker: &str, now: i64) -> Option<QueuedJob> {
        let mut inner = self.inner.lock().await;
        let entry = inner.pending.pop()?;
        let job = entry.job;
        inner.processing.insert(
            job.job_id.clone(),
            ClaimRecord {
                job: job.clone(),
                worker: worker.to_string(),
                claimed_at: now,
            },
        );
        Some(job)
    }

    /// Removes a job from processing on completion or failure. Returns the
    /// claim record if it was still in flight (callers use this for
    /// idempotency: a retried complete on an absent record is a no-op).
    pub async fn finish(&self, job_id: &str) -> Option<ClaimRecord> {
        let mut inner = self.inner.lock().await;
        inner.processing.remove(job_id)
    }

    pub async fn is_processing(&self, job_id: &str) -> Option<ClaimRecord> {
        let inner = self.inner.lock().await;
        inner.processing.get(job_id).cloned()
    }

    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn processing_len(&self) -> usize {
        self.inner.lock().await.processing.len()
    }

    /// Returns claims whose `claimed_at` predates `now - timeout_secs`, for
    /// the claim-timeout refund path.
    pub async fn expired_claims(&self, now: i64, timeout_secs: i64) -> Vec<ClaimRecord> {
        let inner = self.inner.lock().await;
        inner
            .processing
            .values()
            .filter(|record| now - record.claimed_at > timeout_secs)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cents;

    fn job(id: &str, priority: i32, enqueued_at: i64) -> QueuedJob {
        QueuedJob {
            job_id: id.to_string(),
            kind: "spine-mri".to_string(),
            client: "xyz.example".to_string(),
            input_ref: "cid-in".to_string(),
            fee: Cents::from_dollars(0.10),
            enqueued_at,
            priority,
        }
    }

    #[tokio::test]
    async fn claims_highest_priority_first() {
        let queue = JobQueue::new();
        queue.enqueue(job("job-1", 0, 100)).await;
        queue.enqueue(job("job-2", 5, 101)).await;
        let claimed = queue.claim("w1", 200).await.unwrap();
        assert_eq!(claimed.job_id, "job-2");
    }

    #[tokio::test]
    async fn ties_break_by_earliest_enqueued_at() {
        let queue = JobQueue::new();
        queue.enqueue(job("job-1", 0, 200)).await;
        queue.enqueue(job("job-2", 0, 100)).await;
        let claimed = queue.claim("w1", 300).await.unwrap();
        assert_eq!(claimed.job_id, "job-2");
    }

    #[tokio::test]
    async fn claim_moves_job_into_processing_atomically() {
        let queue = JobQueue::new();
        queue.enqueue(job("job-1", 0, 100)).await;
        let claimed = queue.claim("w1", 200).await.unwrap();
        assert_eq!(queue.pending_len().await, 0);
        assert!(queue.is_processing(&claimed.job_id).await.is_some());
    }

    #[tokio::test]
    async fn empty_queue_returns_none() {
        let queue = JobQueue::new();
        assert!(queue.claim("w1", 0).await.is_none());
    }

    #[tokio::test]
    async fn finish_removes_from_processing_and_is_idempotent() {
        let queue = JobQueue::new();
        queue.enqueue(job("job-1", 0, 100)).await;
        let claimed = queue.claim("w1", 200).await.unwrap();
        assert!(queue.finish(&claimed.job_id).await.is_some());
        assert!(queue.finish(&claimed.job_id).await.is_none());
    }

    #[tokio::test]
    async fn expired_claims_detects_stale_in_flight_jobs() {
        let queue = JobQueue::new();
        queue.enqueue(job("job-1", 0, 100)).await;
        queue.claim("w1", 100).await;
        let expired = queue.expired_claims(500, 60).await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].job.job_id, "job-1");
    }
}
