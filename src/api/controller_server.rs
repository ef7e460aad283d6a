// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! HTTP surface for the Dispatch Controller, grounded on the node's own
//! `Router::new().route(...).layer(CorsLayer::permissive()).with_state(..)`
//! server-construction idiom but exposing job submission/claim/completion
//! and worker registration/heartbeat instead of inference endpoints.

use crate::controller::{CompleteRequest, DispatchController, EpochSealer, SubmitRequest, SubmitResponse};
use crate::error::SwarmError;
use crate::types::{Job, WorkerInfo};
use crate::worker::verify_registration;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub struct ControllerServer {
    pub controller: Arc<DispatchController>,
    pub sealer: Arc<EpochSealer>,
}

impl ControllerServer {
    pub fn new(controller: Arc<DispatchController>, sealer: Arc<EpochSealer>) -> Self {
        Self { controller, sealer }
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/jobs/submit", post(submit_handler))
            .route("/jobs/claim", post(claim_handler))
            .route("/jobs/:job_id", get(job_handler))
            .route("/jobs/:job_id/complete", post(complete_handler))
            .route("/jobs/:job_id/fail", post(fail_handler))
            .route("/workers/register", post(register_handler))
            .route("/workers/heartbeat", post(heartbeat_handler))
            .route("/epochs/current", get(current_epoch_handler))
            .route("/epochs/:epoch_id/seal", post(seal_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self)
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn submit_handler(
    State(server): State<Arc<ControllerServer>>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, SwarmError> {
    server.controller.submit(req).await.map(Json)
}

#[derive(Debug, Deserialize)]
struct ClaimBody {
    worker: String,
}

async fn claim_handler(
    State(server): State<Arc<ControllerServer>>,
    Json(body): Json<ClaimBody>,
) -> Result<Response, SwarmError> {
    match server.controller.claim(&body.worker).await? {
        Some(job) => Ok((StatusCode::OK, Json(job)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn job_handler(
    State(server): State<Arc<ControllerServer>>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, SwarmError> {
    server
        .controller
        .job(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| SwarmError::NotFound(format!("job {} not found", job_id)))
}

async fn complete_handler(
    State(server): State<Arc<ControllerServer>>,
    Path(job_id): Path<String>,
    Json(mut req): Json<CompleteRequest>,
) -> Result<StatusCode, SwarmError> {
    req.job_id = job_id;
    server.controller.complete(req).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct FailBody {
    worker: String,
    reason: String,
}

async fn fail_handler(
    State(server): State<Arc<ControllerServer>>,
    Path(job_id): Path<String>,
    Json(body): Json<FailBody>,
) -> Result<StatusCode, SwarmError> {
    warn!(job_id, worker = %body.worker, reason = %body.reason, "worker reported job failure");
    server.controller.fail(&job_id, &body.reason).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    identity: String,
    gpu_model: String,
    vram_gb: u32,
    endpoint: String,
    signature: String,
}

async fn register_handler(
    State(server): State<Arc<ControllerServer>>,
    Json(body): Json<RegisterBody>,
) -> Result<StatusCode, SwarmError> {
    verify_registration(&body.identity, &body.endpoint, &body.signature)?;
    let info = WorkerInfo::new(
        body.identity.clone(),
        body.gpu_model,
        body.vram_gb,
        body.endpoint,
        crate::types::now_unix(),
    );
    info!(identity = %body.identity, "worker registered");
    server.controller.register_worker(info).await;
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
struct HeartbeatBody {
    identity: String,
    status: crate::types::WorkerStatus,
    current_job_id: Option<String>,
}

async fn heartbeat_handler(
    State(server): State<Arc<ControllerServer>>,
    Json(body): Json<HeartbeatBody>,
) -> Result<StatusCode, SwarmError> {
    let known = server.controller.heartbeat(&body.identity, body.status, body.current_job_id).await;
    if known {
        Ok(StatusCode::OK)
    } else {
        Err(SwarmError::NotFound(format!("worker {} not registered", body.identity)))
    }
}

async fn current_epoch_handler(State(server): State<Arc<ControllerServer>>) -> impl IntoResponse {
    Json(server.controller.current_epoch_id().await)
}

async fn seal_handler(
    State(server): State<Arc<ControllerServer>>,
    Path(_epoch_id): Path<String>,
) -> Result<Json<crate::controller::SealedEpoch>, SwarmError> {
    let sealed = server.sealer.seal_and_rotate(crate::types::now_unix()).await?;
    Ok(Json(sealed))
}
