// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The Controller's view of the Ledger: a thin async `reqwest` client over
//! the Ledger's HTTP surface, implementing the same `LedgerClient` seam the
//! in-process `Ledger` implements directly — so `DispatchController` and
//! `EpochSealer` never need to know whether the ledger lives in the same
//! process or across the network. Mirrors `worker::client::HttpControllerClient`.

use super::ledger::LedgerClient;
use crate::error::SwarmError;
use crate::types::{Account, AccountId, Cents};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub struct HttpLedgerClient {
    http: Client,
    base_url: String,
}

impl HttpLedgerClient {
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

    async fn post_ok<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), SwarmError> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| SwarmError::Unavailable(e.to_string()))?;
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
        StatusCode::BAD_REQUEST => SwarmError::BadRequest(body),
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

#[derive(Serialize)]
struct JobAmountBody<'a> {
    amount: Cents,
    job_id: &'a str,
}

#[derive(Serialize)]
struct JobRefBody<'a> {
    job_id: &'a str,
}

#[derive(Serialize)]
struct CreditBody<'a> {
    amount: Cents,
    job_id: &'a str,
    pending: bool,
}

#[derive(Serialize)]
struct SealBody {
    merkle_root: String,
    jobs_count: u64,
    total_revenue: Cents,
    settlements: Vec<(AccountId, Cents)>,
    signature: String,
    sealed_at: i64,
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn open_epoch(&self, epoch_id: &str, _start_time: i64) {
        let _ = self.http.post(self.url(&format!("/epochs/{}/open", epoch_id))).send().await;
    }

    async fn available(&self, account: &str) -> Result<Cents, SwarmError> {
        self.balance_snapshot(account).await.map(|a| a.available())
    }

    async fn reserve(&self, account: &str, amount: Cents, job_id: &str) -> Result<(), SwarmError> {
        self.post_ok(&format!("/balances/{}/reserve", account), &JobAmountBody { amount, job_id }).await
    }

    async fn charge(&self, account: &str, amount: Cents, job_id: &str) -> Result<(), SwarmError> {
        self.post_ok(&format!("/balances/{}/charge", account), &JobAmountBody { amount, job_id }).await
    }

    async fn refund(&self, account: &str, job_id: &str) -> Result<(), SwarmError> {
        self.post_ok(&format!("/balances/{}/refund", account), &JobRefBody { job_id }).await
    }

    async fn credit(&self, account: &str, amount: Cents, job_id: &str, pending: bool) -> Result<(), SwarmError> {
        self.post_ok(&format!("/balances/{}/credit", account), &CreditBody { amount, job_id, pending }).await
    }

    async fn balance_snapshot(&self, account: &str) -> Result<Account, SwarmError> {
        let resp = self
            .http
            .get(self.url(&format!("/balances/{}", account)))
            .send()
            .await
            .map_err(|e| SwarmError::Unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }
        resp.json::<Account>().await.map_err(|e| SwarmError::Internal(e.to_string()))
    }

    async fn seal_epoch(
        &self,
        epoch_id: &str,
        merkle_root: String,
        jobs_count: u64,
        total_revenue: Cents,
        settlements: Vec<(AccountId, Cents)>,
        signature: String,
        sealed_at: i64,
    ) -> Result<(), SwarmError> {
        self.post_ok(
            &format!("/epochs/{}/seal", epoch_id),
            &SealBody { merkle_root, jobs_count, total_revenue, settlements, signature, sealed_at },
        )
        .await
    }
}
