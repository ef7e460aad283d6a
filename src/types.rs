// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Shared domain vocabulary for SwarmOS: the record types from the data
//! model that the controller, ledger, and receipt library all speak in
//! terms of. This module carries no business logic — only foreign-key
//! relationships (identity strings and ids), never pointer graphs, per the
//! cyclic-reference design note.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable account identity — a human-readable name or a wallet address.
pub type AccountId = String;

/// Server-assigned job id of shape `job-<epoch_seq>-<seq>`.
pub type JobId = String;

/// Epoch id of shape `epoch-NNN`.
pub type EpochId = String;

/// Opaque content-addressed storage handle. The core never interprets it.
pub type Cid = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Client,
    Worker,
    Treasury,
}

/// Fixed-point USD amount, stored as integer cents to avoid float drift.
/// Canonical JSON encodes amounts as quoted decimal strings (see
/// `crate::receipt::canonical`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub fn from_dollars(dollars: f64) -> Self {
        Cents((dollars * 100.0).round() as i64)
    }

    pub fn checked_add(self, other: Cents) -> Option<Cents> {
        self.0.checked_add(other.0).map(Cents)
    }

    pub fn checked_sub(self, other: Cents) -> Option<Cents> {
        self.0.checked_sub(other.0).map(Cents)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

impl std::ops::Add for Cents {
    type Output = Cents;
    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Cents {
    type Output = Cents;
    fn sub(self, rhs: Cents) -> Cents {
        Cents(self.0 - rhs.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub kind: AccountKind,
    pub balance: Cents,
    /// Client-only: soft hold between submission and charge/refund.
    pub reserved: Cents,
    /// Worker-only: credited at completion, materialized at epoch seal.
    pub pending: Cents,
    pub total_in: Cents,
    pub total_out: Cents,
}

impl Account {
    pub fn new(id: AccountId, kind: AccountKind) -> Self {
        Self {
            id,
            kind,
            balance: Cents::ZERO,
            reserved: Cents::ZERO,
            pending: Cents::ZERO,
            total_in: Cents::ZERO,
            total_out: Cents::ZERO,
        }
    }

    /// `available = balance - reserved` for clients, `balance` for workers.
    pub fn available(&self) -> Cents {
        match self.kind {
            AccountKind::Client => self.balance - self.reserved,
            AccountKind::Worker | AccountKind::Treasury => self.balance,
        }
    }

    /// Invariant: `balance >= reserved` at rest, `reserved >= 0`, `pending >= 0`.
    pub fn invariant_holds(&self) -> bool {
        self.balance >= self.reserved && self.reserved >= Cents::ZERO && self.pending >= Cents::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub epoch_id: EpochId,
    pub client: AccountId,
    pub worker: Option<AccountId>,
    pub kind: String,
    pub input_ref: Cid,
    pub result_ref: Option<Cid>,
    pub fee: Cents,
    pub status: JobStatus,
    pub poe_hash: Option<String>,
    pub execution_ms: Option<u64>,
    pub submitted_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochStatus {
    Active,
    Sealing,
    Finalized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epoch {
    pub epoch_id: EpochId,
    pub status: EpochStatus,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub jobs_count: u64,
    pub total_revenue: Cents,
    pub merkle_root: Option<String>,
    pub signature: Option<String>,
    pub ipfs_hash: Option<Cid>,
}

impl Epoch {
    pub fn new(epoch_id: EpochId, start_time: i64) -> Self {
        Self {
            epoch_id,
            status: EpochStatus::Active,
            start_time,
            end_time: None,
            jobs_count: 0,
            total_revenue: Cents::ZERO,
            merkle_root: None,
            signature: None,
            ipfs_hash: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    JobCharge,
    JobRefund,
    Earning,
    Withdrawal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub account: AccountId,
    pub kind: TransactionKind,
    /// Signed amount: positive credits the account, negative debits it.
    pub amount: i64,
    pub balance_after: Cents,
    pub reference: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositStatus {
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub external_ref: String,
    pub account: AccountId,
    pub amount: Cents,
    pub status: DepositStatus,
    pub transaction_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Pending,
    Finalized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub withdrawal_id: String,
    pub account: AccountId,
    pub amount: Cents,
    pub destination: String,
    pub status: WithdrawalStatus,
    pub transaction_id: Option<u64>,
    pub external_tx: Option<String>,
}

/// Transient record living only in the controller's queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: JobId,
    pub kind: String,
    pub client: AccountId,
    pub input_ref: Cid,
    pub fee: Cents,
    pub enqueued_at: i64,
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerStatus {
    Online,
    Busy,
    Offline,
    Draining,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub identity: AccountId,
    pub status: WorkerStatus,
    pub gpu_model: String,
    pub vram_gb: u32,
    pub endpoint: String,
    pub current_job_id: Option<JobId>,
    /// Monotonic timestamp (seconds) of the last heartbeat.
    pub last_heartbeat: i64,
    pub jobs_completed_this_epoch: u64,
    pub registered_at: i64,
}

impl WorkerInfo {
    pub fn new(identity: AccountId, gpu_model: String, vram_gb: u32, endpoint: String, now: i64) -> Self {
        Self {
            identity,
            status: WorkerStatus::Online,
            gpu_model,
            vram_gb,
            endpoint,
            current_job_id: None,
            last_heartbeat: now,
            jobs_completed_this_epoch: 0,
            registered_at: now,
        }
    }
}

/// Wall-clock seconds since the Unix epoch. Centralized so tests can stub it.
pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}
