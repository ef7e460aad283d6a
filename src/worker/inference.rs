// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The external inference collaborator: a black box that turns a claimed
//! job into a result reference and an execution time. Kept as a trait so
//! the claim loop never depends on how inference is actually run (local
//! GPU process, remote accelerator, or a test double).

use crate::types::{Cid, QueuedJob};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    pub result_ref: Cid,
    pub execution_ms: u64,
}

#[async_trait]
pub trait Inference: Send + Sync {
    /// Runs the job to completion, or returns an error describing why it
    /// could not be run (the claim loop turns this into `fail(job_id, ..)`).
    async fn execute(&self, job: &QueuedJob, timeout: Duration) -> anyhow::Result<InferenceOutcome>;
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    kind: &'a str,
    input_ref: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    result_ref: Cid,
    execution_ms: u64,
}

/// GPU inference itself is out of scope for the core (§1): this is the
/// client side of the black-box contract `execute(job) -> (result_ref,
/// execution_ms)`, POSTing to an operator-configured sidecar the same way
/// `vision::vlm_client::VlmClient` talks to an OpenAI-compatible endpoint.
pub struct HttpInference {
    http: Client,
    endpoint: String,
}

impl HttpInference {
    pub fn new(endpoint: String) -> Self {
        Self { http: Client::new(), endpoint }
    }
}

#[async_trait]
impl Inference for HttpInference {
    async fn execute(&self, job: &QueuedJob, timeout: Duration) -> anyhow::Result<InferenceOutcome> {
        let resp = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&InferenceRequest { kind: &job.kind, input_ref: &job.input_ref })
            .send()
            .await?
            .error_for_status()?
            .json::<InferenceResponse>()
            .await?;
        Ok(InferenceOutcome { result_ref: resp.result_ref, execution_ms: resp.execution_ms })
    }
}

#[cfg(test)]
pub struct MockInference {
    pub result_ref: Cid,
    pub execution_ms: u64,
    pub should_fail: bool,
}

#[cfg(test)]
#[async_trait]
impl Inference for MockInference {
    async fn execute(&self, _job: &QueuedJob, _timeout: Duration) -> anyhow::Result<InferenceOutcome> {
        if self.should_fail {
            anyhow::bail!("inference failed");
        }
        Ok(InferenceOutcome { result_ref: self.result_ref.clone(), execution_ms: self.execution_ms })
    }
}
