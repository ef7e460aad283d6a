// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The worker's view of the Controller: a thin async trait over the HTTP
//! surface (`/workers/register`, `/workers/heartbeat`, `/jobs/claim`,
//! `/jobs/{id}/complete`), generalized from `contracts::client::Web3Client`'s
//! role as a swappable RPC boundary but speaking JSON-over-`reqwest`
//! instead of JSON-RPC, matching the `reqwest::Client` usage already in
//! this codebase's other HTTP client modules (`vector::client`,
//! `vision::vlm_client`).

use crate::controller::CompleteRequest;
use crate::error::SwarmError;
use crate::types::{AccountId, JobId, QueuedJob, WorkerStatus};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub identity: AccountId,
    pub gpu_model: String,
    pub vram_gb: u32,
    pub endpoint: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub identity: AccountId,
    pub status: WorkerStatus,
    pub current_job_id: Option<JobId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub worker: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailRequest {
    pub job_id: JobId,
    pub worker: AccountId,
    pub reason: String,
}

/// The seam a `WorkerAgent` is built against, so the whole lifecycle can be
/// driven in tests without a real HTTP round trip.
#[async_trait]
pub trait ControllerClient: Send + Sync {
    async fn register(&self, req: RegisterRequest) -> Result<(), SwarmError>;
    async fn heartbeat(&self, req: HeartbeatRequest) -> Result<(), SwarmError>;
    async fn claim(&self, worker: &str) -> Result<Option<QueuedJob>, SwarmError>;
    async fn complete(&self, req: CompleteRequest) -> Result<(), SwarmError>;
    async fn fail(&self, req: FailRequest) -> Result<(), SwarmError>;
}

/// Talks to a real `swarm-controller` process over HTTP.
pub struct HttpControllerClient {
    http: Client,
    base_url: String,
}

impl HttpControllerClient {
    pub fn new(base_url: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with static config");
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn handle_response(resp: reqwest::Response) -> Result<(), SwarmError> {
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(map_status(status, body))
        }
    }
}

fn map_status(status: reqwest::StatusCode, body: String) -> SwarmError {
    use reqwest::StatusCode;
    match status {
        StatusCode::BAD_REQUEST => SwarmError::Unauthorized(body),
        StatusCode::FORBIDDEN => SwarmError::Forbidden(body),
        StatusCode::NOT_FOUND => SwarmError::NotFound(body),
        StatusCode::CONFLICT => SwarmError::Conflict(body),
        StatusCode::PAYMENT_REQUIRED => SwarmError::InsufficientFunds { available: "0".to_string(), required: body },
        StatusCode::PRECONDITION_FAILED => SwarmError::PreconditionFailed(body),
        StatusCode::GATEWAY_TIMEOUT => SwarmError::Timeout(body),
        StatusCode::SERVICE_UNAVAILABLE => SwarmError::Unavailable(body),
        _ => SwarmError::Internal(body),
    }
}

#[async_trait]
impl ControllerClient for HttpControllerClient {
    async fn register(&self, req: RegisterRequest) -> Result<(), SwarmError> {
        let resp = self
            .http
            .post(self.url("/workers/register"))
            .json(&req)
            .send()
            .await
            .map_err(|e| SwarmError::Unavailable(e.to_string()))?;
        Self::handle_response(resp).await
    }

    async fn heartbeat(&self, req: HeartbeatRequest) -> Result<(), SwarmError> {
        let resp = self
            .http
            .post(self.url("/workers/heartbeat"))
            .json(&req)
            .send()
            .await
            .map_err(|e| SwarmError::Unavailable(e.to_string()))?;
        Self::handle_response(resp).await
    }

    async fn claim(&self, worker: &str) -> Result<Option<QueuedJob>, SwarmError> {
        let resp = self
            .http
            .post(self.url("/jobs/claim"))
            .json(&ClaimRequest { worker: worker.to_string() })
            .send()
            .await
            .map_err(|e| SwarmError::Unavailable(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }
        resp.json::<Option<QueuedJob>>()
            .await
            .map_err(|e| SwarmError::Internal(e.to_string()))
    }

    async fn complete(&self, req: CompleteRequest) -> Result<(), SwarmError> {
        let resp = self
            .http
            .post(self.url(&format!("/jobs/{}/complete", req.job_id)))
            .json(&req)
            .send()
            .await
            .map_err(|e| SwarmError::Unavailable(e.to_string()))?;
        Self::handle_response(resp).await
    }

    async fn fail(&self, req: FailRequest) -> Result<(), SwarmError> {
        let resp = self
            .http
            .post(self.url(&format!("/jobs/{}/fail", req.job_id)))
            .json(&req)
            .send()
            .await
            .map_err(|e| SwarmError::Unavailable(e.to_string()))?;
        Self::handle_response(resp).await
    }
}
