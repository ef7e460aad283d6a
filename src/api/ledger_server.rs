// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! HTTP surface for the Settlement Ledger: balances, deposits, withdrawals,
//! epoch bookkeeping, and receipt verification, built on the same
//! router/CORS/state idiom as `controller_server`.

use crate::error::SwarmError;
use crate::ledger::{Ledger, LedgerClient};
use crate::receipt::{verify_receipt, Receipt};
use crate::types::{Account, AccountId, Cents, Epoch};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct LedgerServer {
    pub ledger: Arc<Ledger>,
}

impl LedgerServer {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/balances/:account", get(balance_handler))
            .route("/balances/:account/deposit", post(deposit_handler))
            .route("/balances/:account/reserve", post(reserve_handler))
            .route("/balances/:account/charge", post(charge_handler))
            .route("/balances/:account/refund", post(refund_handler))
            .route("/balances/:account/credit", post(credit_handler))
            .route("/balances/:account/withdraw", post(withdraw_request_handler))
            .route("/balances/:account/withdraw/finalize", post(withdraw_finalize_handler))
            .route("/epochs/:epoch_id", get(epoch_handler))
            .route("/epochs/:epoch_id/open", post(open_epoch_handler))
            .route("/epochs/:epoch_id/seal", post(seal_handler))
            .route("/verify", post(verify_handler))
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

async fn balance_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(account): Path<String>,
) -> Result<Json<Account>, SwarmError> {
    server.ledger.balance_snapshot(&account).await.map(Json)
}

#[derive(Debug, Deserialize)]
struct DepositBody {
    amount: Cents,
    external_ref: String,
}

async fn deposit_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(account): Path<String>,
    Json(body): Json<DepositBody>,
) -> Result<StatusCode, SwarmError> {
    server
        .ledger
        .deposit(&account, body.amount, &body.external_ref, crate::types::now_unix())
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct JobAmountBody {
    amount: Cents,
    job_id: String,
}

async fn reserve_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(account): Path<String>,
    Json(body): Json<JobAmountBody>,
) -> Result<StatusCode, SwarmError> {
    LedgerClient::reserve(server.ledger.as_ref(), &account, body.amount, &body.job_id).await?;
    Ok(StatusCode::OK)
}

async fn charge_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(account): Path<String>,
    Json(body): Json<JobAmountBody>,
) -> Result<StatusCode, SwarmError> {
    LedgerClient::charge(server.ledger.as_ref(), &account, body.amount, &body.job_id).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct JobRefBody {
    job_id: String,
}

async fn refund_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(account): Path<String>,
    Json(body): Json<JobRefBody>,
) -> Result<StatusCode, SwarmError> {
    LedgerClient::refund(server.ledger.as_ref(), &account, &body.job_id).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct CreditBody {
    amount: Cents,
    job_id: String,
    pending: bool,
}

async fn credit_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(account): Path<String>,
    Json(body): Json<CreditBody>,
) -> Result<StatusCode, SwarmError> {
    LedgerClient::credit(server.ledger.as_ref(), &account, body.amount, &body.job_id, body.pending).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct WithdrawRequestBody {
    amount: Cents,
    destination: String,
    withdrawal_id: String,
}

async fn withdraw_request_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(account): Path<String>,
    Json(body): Json<WithdrawRequestBody>,
) -> Result<StatusCode, SwarmError> {
    server
        .ledger
        .withdraw_request(&account, body.amount, &body.destination, &body.withdrawal_id)
        .await?;
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
struct WithdrawFinalizeBody {
    withdrawal_id: String,
    external_tx: String,
}

async fn withdraw_finalize_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(account): Path<String>,
    Json(body): Json<WithdrawFinalizeBody>,
) -> Result<StatusCode, SwarmError> {
    server
        .ledger
        .withdraw_finalize(&account, &body.withdrawal_id, &body.external_tx, crate::types::now_unix())
        .await?;
    Ok(StatusCode::OK)
}

async fn epoch_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(epoch_id): Path<String>,
) -> Result<Json<Epoch>, SwarmError> {
    server
        .ledger
        .epoch(&epoch_id)
        .await
        .map(Json)
        .ok_or_else(|| SwarmError::NotFound(format!("epoch {} not found", epoch_id)))
}

async fn open_epoch_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(epoch_id): Path<String>,
) -> Result<StatusCode, SwarmError> {
    server.ledger.open_epoch(epoch_id, crate::types::now_unix()).await;
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
struct SealBody {
    merkle_root: String,
    jobs_count: u64,
    total_revenue: Cents,
    settlements: Vec<(AccountId, Cents)>,
    signature: String,
    sealed_at: i64,
}

async fn seal_handler(
    State(server): State<Arc<LedgerServer>>,
    Path(epoch_id): Path<String>,
    Json(body): Json<SealBody>,
) -> Result<StatusCode, SwarmError> {
    server
        .ledger
        .seal_epoch(
            &epoch_id,
            body.merkle_root,
            body.jobs_count,
            body.total_revenue,
            body.settlements,
            body.signature,
            body.sealed_at,
        )
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    receipt: Receipt,
    expected_root: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    valid: bool,
}

async fn verify_handler(Json(body): Json<VerifyRequest>) -> impl IntoResponse {
    Json(VerifyResponse { valid: verify_receipt(&body.receipt, &body.expected_root) })
}
