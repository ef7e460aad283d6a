// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Background heartbeat sweep: demotes workers with a stale heartbeat and
//! releases whatever job they held into the claim-timeout/refund path,
//! adapted from the job monitor's `tokio::spawn` + `interval()` +
//! `shutdown_rx` polling loop.

use super::dispatch::DispatchController;
use crate::config::SwarmConfig;
use crate::types::now_unix;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

pub struct Sweeper {
    controller: Arc<DispatchController>,
    config: Arc<SwarmConfig>,
}

impl Sweeper {
    pub fn new(controller: Arc<DispatchController>, config: Arc<SwarmConfig>) -> Self {
        Self { controller, config }
    }

    /// Runs one sweep pass: demotes stale workers (releasing their current
    /// job into `fail`) and fails any claim that outlived its timeout.
    pub async fn sweep_once(&self) {
        let now = now_unix();

        let demoted = self.controller.registry().sweep_stale(now, self.config.heartbeat_timeout_secs).await;
        for (identity, job_id) in demoted {
            if let Some(job_id) = job_id {
                warn!(identity, job_id, "releasing job held by stale worker");
                if let Err(e) = self.controller.fail(&job_id, "worker heartbeat timed out").await {
                    error!(identity, job_id, error = %e, "failed to release job from stale worker");
                }
            }
        }

        let expired = self.controller.queue().expired_claims(now, self.config.claim_timeout_floor_secs).await;
        for claim in expired {
            warn!(job_id = claim.job.job_id, worker = claim.worker, "claim exceeded timeout");
            if let Err(e) = self.controller.fail(&claim.job.job_id, "claim timeout exceeded").await {
                error!(job_id = claim.job.job_id, error = %e, "failed to fail a timed-out claim");
            }
        }
    }

    /// Spawns the sweep loop on a background task. Returns a handle whose
    /// sender, dropped or sent to, stops the loop.
    pub fn spawn(self: Arc<Self>) -> mpsc::Sender<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let sweep_interval = self.config.heartbeat_sweep_interval_secs;

        tokio::spawn(async move {
            let mut ticker = interval(std::time::Duration::from_secs(sweep_interval));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("heartbeat sweeper shutting down");
                        break;
                    }
                }
            }
        });

        shutdown_tx
    }
}
