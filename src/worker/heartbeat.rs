// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The heartbeat loop: sends a periodic liveness signal to the Controller
//! and drains the agent after too many consecutive failures, generalized
//! from `JobProcessor::attempt_reconnection`'s retry-with-backoff shape but
//! run as a standing loop rather than a one-shot reconnect.

use super::agent::{AgentState, WorkerAgent};
use super::client::HeartbeatRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Runs until `shutdown` fires or the agent reaches `Stopped`. Exits the
/// loop (without stopping the agent itself) once three consecutive
/// heartbeats fail, after moving the agent into `Draining` — the claim loop
/// notices the same transition and stops claiming new work.
pub async fn run_heartbeat_loop(agent: Arc<WorkerAgent>, shutdown: CancellationToken) {
    let interval = Duration::from_secs(agent.config.heartbeat_interval_secs);
    loop {
        if shutdown.is_cancelled() || agent.state().await == AgentState::Stopped {
            return;
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }

        if agent.state().await == AgentState::Draining {
            continue;
        }

        let req = HeartbeatRequest {
            identity: agent.identity.clone(),
            status: if agent.current_job().await.is_some() {
                crate::types::WorkerStatus::Busy
            } else {
                crate::types::WorkerStatus::Online
            },
            current_job_id: agent.current_job().await,
        };

        match agent.client.heartbeat(req).await {
            Ok(()) => {
                agent.record_heartbeat_result(true);
            }
            Err(e) => {
                let failures = agent.record_heartbeat_result(false);
                warn!(identity = %agent.identity, error = %e, failures, "heartbeat failed");
                if failures >= agent.config.heartbeat_failure_limit {
                    error!(identity = %agent.identity, "heartbeat failure limit reached, draining");
                    agent.begin_draining().await;
                }
            }
        }
    }
}
