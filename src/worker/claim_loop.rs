// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The claim loop: while idle, poll the Controller for work; once a job is
//! claimed, run inference, sign the proof-of-execution hash, and report
//! completion or failure. Generalized from `JobClaimer`'s claim/backoff
//! shape and `ResultSubmitter`'s submit-the-proof step.

use super::agent::{AgentState, WorkerAgent};
use super::client::FailRequest;
use crate::controller::CompleteRequest;
use crate::crypto::job_complete_message;
use crate::receipt::poe_hash;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs until `shutdown` fires or the agent is draining and has no job left
/// to finish. Each iteration: poll for a claim, run it to completion or
/// report failure, then go back to polling.
pub async fn run_claim_loop(agent: Arc<WorkerAgent>, shutdown: CancellationToken) {
    let poll_interval = Duration::from_secs(agent.config.poll_interval_secs);

    loop {
        if shutdown.is_cancelled() {
            return;
        }

        match agent.state().await {
            AgentState::Draining | AgentState::Stopped => return,
            AgentState::Unregistered | AgentState::Registering => {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
                continue;
            }
            AgentState::Processing => {
                // Shouldn't observe this from the top of the loop; the job
                // that set it also clears it before the next iteration.
                continue;
            }
            AgentState::Idle => {}
        }

        let claimed = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = agent.client.claim(&agent.identity) => result,
        };

        let job = match claimed {
            Ok(Some(job)) => job,
            Ok(None) => {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
                continue;
            }
            Err(e) => {
                warn!(identity = %agent.identity, error = %e, "claim request failed");
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
                continue;
            }
        };

        agent.set_state_processing().await;
        agent.set_current_job(Some(job.job_id.clone())).await;
        info!(identity = %agent.identity, job_id = %job.job_id, "claimed job");

        let timeout = Duration::from_secs(agent.config.default_inference_timeout_secs);
        match agent.inference.execute(&job, timeout).await {
            Ok(outcome) => {
                let hash = poe_hash(&job.job_id, &outcome.result_ref, &agent.identity);
                let message = job_complete_message(&job.job_id, &outcome.result_ref, &hash);
                let signature = agent.sign_message(&message);
                let req = CompleteRequest {
                    job_id: job.job_id.clone(),
                    worker: agent.identity.clone(),
                    result_ref: outcome.result_ref,
                    poe_hash: hash,
                    execution_ms: outcome.execution_ms,
                    signature,
                };
                if let Err(e) = agent.client.complete(req).await {
                    error!(identity = %agent.identity, job_id = %job.job_id, error = %e, "complete failed");
                }
            }
            Err(e) => {
                warn!(identity = %agent.identity, job_id = %job.job_id, error = %e, "inference failed");
                let req = FailRequest {
                    job_id: job.job_id.clone(),
                    worker: agent.identity.clone(),
                    reason: e.to_string(),
                };
                if let Err(e) = agent.client.fail(req).await {
                    error!(identity = %agent.identity, job_id = %job.job_id, error = %e, "fail report failed");
                }
            }
        }

        agent.set_current_job(None).await;
        if agent.state().await != AgentState::Draining {
            agent.set_state_idle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwarmConfig;
    use crate::error::SwarmError;
    use crate::types::{Cents, QueuedJob};
    use crate::worker::client::{ControllerClient, HeartbeatRequest, RegisterRequest};
    use crate::worker::inference::MockInference;
    use async_trait::async_trait;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;
    use std::sync::Mutex as StdMutex;

    struct OneShotController {
        job: StdMutex<Option<QueuedJob>>,
        completed: StdMutex<Vec<CompleteRequest>>,
        failed: StdMutex<Vec<FailRequest>>,
    }

    #[async_trait]
    impl ControllerClient for OneShotController {
        async fn register(&self, _req: RegisterRequest) -> Result<(), SwarmError> {
            Ok(())
        }
        async fn heartbeat(&self, _req: HeartbeatRequest) -> Result<(), SwarmError> {
            Ok(())
        }
        async fn claim(&self, _worker: &str) -> Result<Option<QueuedJob>, SwarmError> {
            Ok(self.job.lock().unwrap().take())
        }
        async fn complete(&self, req: CompleteRequest) -> Result<(), SwarmError> {
            self.completed.lock().unwrap().push(req);
            Ok(())
        }
        async fn fail(&self, req: FailRequest) -> Result<(), SwarmError> {
            self.failed.lock().unwrap().push(req);
            Ok(())
        }
    }

    fn sample_job() -> QueuedJob {
        QueuedJob {
            job_id: "job-001-0001".to_string(),
            kind: "spine-mri".to_string(),
            client: "client.example".to_string(),
            input_ref: "cid-in".to_string(),
            fee: Cents::from_dollars(0.10),
            enqueued_at: 1_700_000_000,
            priority: 0,
        }
    }

    fn test_agent(client: Arc<dyn ControllerClient>, should_fail: bool) -> Arc<WorkerAgent> {
        let mut config = SwarmConfig::default();
        config.poll_interval_secs = 0;
        let inference = Arc::new(MockInference {
            result_ref: "cid-out".to_string(),
            execution_ms: 5,
            should_fail,
        });
        let agent = Arc::new(WorkerAgent::new(
            "0xabc".to_string(),
            "rtx-4090".to_string(),
            24,
            "http://localhost:9000".to_string(),
            Arc::new(config),
            client,
            inference,
            SigningKey::random(&mut OsRng),
        ));
        agent
    }

    #[tokio::test]
    async fn successful_job_reports_completion_and_returns_to_idle() {
        let controller = Arc::new(OneShotController {
            job: StdMutex::new(Some(sample_job())),
            completed: StdMutex::new(Vec::new()),
            failed: StdMutex::new(Vec::new()),
        });
        let agent = test_agent(controller.clone(), false);
        agent.force_idle_for_test().await;

        let shutdown = CancellationToken::new();
        let agent_clone = agent.clone();
        let shutdown_clone = shutdown.clone();
        let handle = tokio::spawn(async move { run_claim_loop(agent_clone, shutdown_clone).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        let _ = handle.await;

        assert_eq!(controller.completed.lock().unwrap().len(), 1);
        assert!(controller.failed.lock().unwrap().is_empty());
        assert!(agent.current_job().await.is_none());
    }

    #[tokio::test]
    async fn failed_inference_reports_failure() {
        let controller = Arc::new(OneShotController {
            job: StdMutex::new(Some(sample_job())),
            completed: StdMutex::new(Vec::new()),
            failed: StdMutex::new(Vec::new()),
        });
        let agent = test_agent(controller.clone(), true);
        agent.force_idle_for_test().await;

        let shutdown = CancellationToken::new();
        let agent_clone = agent.clone();
        let shutdown_clone = shutdown.clone();
        let handle = tokio::spawn(async move { run_claim_loop(agent_clone, shutdown_clone).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        let _ = handle.await;

        assert!(controller.completed.lock().unwrap().is_empty());
        assert_eq!(controller.failed.lock().unwrap().len(), 1);
    }
}
