// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The worker registry: generalized from the on-chain host registry's
//! `Arc<RwLock<...>>` map-of-maps shape, but keyed on heartbeat timestamps
//! rather than stake lookups against a contract monitor.

use crate::types::{AccountId, JobId, WorkerInfo, WorkerStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub total_workers: usize,
    pub online: usize,
    pub busy: usize,
    pub offline: usize,
    pub draining: usize,
}

#[derive(Default)]
pub struct WorkerRegistry {
    workers: Arc<RwLock<HashMap<AccountId, WorkerInfo>>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, info: WorkerInfo) {
        debug!(identity = %info.identity, "registering worker");
        self.workers.write().await.insert(info.identity.clone(), info);
    }

    pub async fn get(&self, identity: &str) -> Option<WorkerInfo> {
        self.workers.read().await.get(identity).cloned()
    }

    /// Refreshes `last_heartbeat` and optionally the reported status and
    /// in-flight job. No-op (returns false) for an unregistered worker.
    pub async fn heartbeat(
        &self,
        identity: &str,
        status: WorkerStatus,
        current_job_id: Option<JobId>,
        now: i64,
    ) -> bool {
        let mut workers = self.workers.write().await;
        match workers.get_mut(identity) {
            Some(worker) => {
                worker.last_heartbeat = now;
                worker.status = status;
                worker.current_job_id = current_job_id;
                true
            }
            None => false,
        }
    }

    pub async fn set_status(&self, identity: &str, status: WorkerStatus) {
        if let Some(worker) = self.workers.write().await.get_mut(identity) {
            worker.status = status;
        }
    }

    pub async fn mark_job_completed(&self, identity: &str) {
        if let Some(worker) = self.workers.write().await.get_mut(identity) {
            worker.jobs_completed_this_epoch += 1;
        }
    }

    pub async fn reset_epoch_counters(&self) {
        let mut workers = self.workers.write().await;
        for worker in workers.values_mut() {
            worker.jobs_completed_this_epoch = 0;
        }
    }

    pub async fn all(&self) -> Vec<WorkerInfo> {
        self.workers.read().await.values().cloned().collect()
    }

    /// Demotes workers whose last heartbeat predates `now - timeout_secs` to
    /// `offline`, releasing whatever job they were holding. Returns the
    /// identities demoted along with any job they were processing, so the
    /// caller can route those jobs through the claim-timeout path.
    pub async fn sweep_stale(&self, now: i64, timeout_secs: i64) -> Vec<(AccountId, Option<JobId>)> {
        let mut workers = self.workers.write().await;
        let mut demoted = Vec::new();
        for worker in workers.values_mut() {
            if worker.status == WorkerStatus::Offline {
                continue;
            }
            if now - worker.last_heartbeat > timeout_secs {
                warn!(identity = %worker.identity, "heartbeat stale, demoting to offline");
                let released_job = worker.current_job_id.take();
                worker.status = WorkerStatus::Offline;
                demoted.push((worker.identity.clone(), released_job));
            }
        }
        demoted
    }

    pub async fn stats(&self) -> RegistryStats {
        let workers = self.workers.read().await;
        let mut stats = RegistryStats {
            total_workers: workers.len(),
            ..Default::default()
        };
        for worker in workers.values() {
            match worker.status {
                WorkerStatus::Online => stats.online += 1,
                WorkerStatus::Busy => stats.busy += 1,
                WorkerStatus::Offline => stats.offline += 1,
                WorkerStatus::Draining => stats.draining += 1,
            }
        }
        stats
    }
}
