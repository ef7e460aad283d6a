// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The top-level Ledger: composes per-account state behind a single lock
//! map plus the global transaction log, exposing the operations of §4.2
//! and enforcing its invariants as runtime checks that return
//! `SwarmError::Internal` rather than silently corrupting state.

use super::account::AccountState;
use super::transaction::TransactionLog;
use crate::error::SwarmError;
use crate::types::{Account, AccountId, AccountKind, Cents, Epoch, EpochId, EpochStatus, TransactionKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn open_epoch(&self, epoch_id: &str, start_time: i64);
    async fn available(&self, account: &str) -> Result<Cents, SwarmError>;
    async fn reserve(&self, account: &str, amount: Cents, job_id: &str) -> Result<(), SwarmError>;
    async fn charge(&self, account: &str, amount: Cents, job_id: &str) -> Result<(), SwarmError>;
    async fn refund(&self, account: &str, job_id: &str) -> Result<(), SwarmError>;
    async fn credit(&self, account: &str, amount: Cents, job_id: &str, pending: bool) -> Result<(), SwarmError>;
    async fn balance_snapshot(&self, account: &str) -> Result<Account, SwarmError>;
    async fn seal_epoch(
        &self,
        epoch_id: &str,
        merkle_root: String,
        jobs_count: u64,
        total_revenue: Cents,
        settlements: Vec<(AccountId, Cents)>,
        signature: String,
        sealed_at: i64,
    ) -> Result<(), SwarmError>;
}

pub struct Ledger {
    accounts: Arc<RwLock<HashMap<AccountId, AccountState>>>,
    epochs: Arc<RwLock<HashMap<EpochId, Epoch>>>,
    pub transactions: Arc<TransactionLog>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            epochs: Arc::new(RwLock::new(HashMap::new())),
            transactions: Arc::new(TransactionLog::new()),
        }
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn ensure_account(&self, id: &str, kind: AccountKind) {
        let mut accounts = self.accounts.write().await;
        accounts
            .entry(id.to_string())
            .or_insert_with(|| AccountState::new(id.to_string(), kind));
    }

    pub async fn open_epoch(&self, epoch_id: EpochId, start_time: i64) {
        let mut epochs = self.epochs.write().await;
        epochs.insert(epoch_id.clone(), Epoch::new(epoch_id, start_time));
    }

    pub async fn epoch(&self, epoch_id: &str) -> Option<Epoch> {
        self.epochs.read().await.get(epoch_id).cloned()
    }

    pub async fn deposit(&self, account: &str, amount: Cents, external_ref: &str, now: i64) -> Result<(), SwarmError> {
        self.ensure_account(account, AccountKind::Client).await;
        let mut accounts = self.accounts.write().await;
        let state = accounts.get_mut(account).expect("just ensured");
        if state.deposit(amount, external_ref)? {
            self.transactions.append(
                account.to_string(),
                TransactionKind::Deposit,
                amount.0,
                state.record.balance,
                Some(external_ref.to_string()),
                now,
            );
        }
        Ok(())
    }

    pub async fn withdraw_request(
        &self,
        account: &str,
        amount: Cents,
        destination: &str,
        withdrawal_id: &str,
    ) -> Result<(), SwarmError> {
        let mut accounts = self.accounts.write().await;
        let state = accounts
            .get_mut(account)
            .ok_or_else(|| SwarmError::NotFound(format!("account {} not found", account)))?;
        state.withdraw_request(withdrawal_id, amount, destination)?;
        Ok(())
    }

    pub async fn withdraw_finalize(&self, account: &str, withdrawal_id: &str, external_tx: &str, now: i64) -> Result<(), SwarmError> {
        let mut accounts = self.accounts.write().await;
        let state = accounts
            .get_mut(account)
            .ok_or_else(|| SwarmError::NotFound(format!("account {} not found", account)))?;
        if let Some(amount) = state.withdraw_finalize(withdrawal_id, external_tx)? {
            self.transactions.append(
                account.to_string(),
                TransactionKind::Withdrawal,
                -amount.0,
                state.record.balance,
                Some(withdrawal_id.to_string()),
                now,
            );
        }
        Ok(())
    }

    pub async fn balance_snapshot(&self, account: &str) -> Result<Account, SwarmError> {
        let accounts = self.accounts.read().await;
        accounts
            .get(account)
            .map(|s| s.record.clone())
            .ok_or_else(|| SwarmError::NotFound(format!("account {} not found", account)))
    }

    /// Seals `epoch_id`: moves every listed settlement's pending balance to
    /// available balance, records the epoch's derived fields, and flips
    /// `active`/`sealing` to `finalized`. Rejects a second call for the same
    /// epoch once it is already finalized.
    pub async fn seal_epoch(
        &self,
        epoch_id: &str,
        merkle_root: String,
        jobs_count: u64,
        total_revenue: Cents,
        settlements: Vec<(AccountId, Cents)>,
        signature: String,
        sealed_at: i64,
    ) -> Result<(), SwarmError> {
        let mut epochs = self.epochs.write().await;
        let epoch = epochs
            .get_mut(epoch_id)
            .ok_or_else(|| SwarmError::NotFound(format!("epoch {} not found", epoch_id)))?;
        if epoch.status == EpochStatus::Finalized {
            return Err(SwarmError::PreconditionFailed(format!(
                "epoch {} is already finalized",
                epoch_id
            )));
        }

        let mut accounts = self.accounts.write().await;
        for (worker, amount) in &settlements {
            let state = accounts
                .entry(worker.clone())
                .or_insert_with(|| AccountState::new(worker.clone(), AccountKind::Worker));
            if state.record.pending < *amount {
                return Err(SwarmError::Internal(format!(
                    "pending balance invariant violated for {}",
                    worker
                )));
            }
            state.finalize_pending(*amount);
            self.transactions.append(
                worker.clone(),
                TransactionKind::Earning,
                amount.0,
                state.record.balance,
                Some(epoch_id.to_string()),
                sealed_at,
            );
        }

        epoch.jobs_count = jobs_count;
        epoch.total_revenue = total_revenue;
        epoch.merkle_root = Some(merkle_root);
        epoch.signature = Some(signature);
        epoch.end_time = Some(sealed_at);
        epoch.status = EpochStatus::Finalized;

        info!(epoch_id, jobs_count, "epoch sealed");
        Ok(())
    }

    pub async fn credit_treasury(&self, account: &str, amount: Cents, reference: &str, now: i64) -> Result<(), SwarmError> {
        self.ensure_account(account, AccountKind::Treasury).await;
        let mut accounts = self.accounts.write().await;
        let state = accounts.get_mut(account).expect("just ensured");
        if state.credit(amount, reference, false)? {
            self.transactions.append(
                account.to_string(),
                TransactionKind::Earning,
                amount.0,
                state.record.balance,
                Some(reference.to_string()),
                now,
            );
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for Ledger {
    async fn open_epoch(&self, epoch_id: &str, start_time: i64) {
        Ledger::open_epoch(self, epoch_id.to_string(), start_time).await
    }

    async fn available(&self, account: &str) -> Result<Cents, SwarmError> {
        self.balance_snapshot(account).await.map(|a| a.available())
    }

    async fn reserve(&self, account: &str, amount: Cents, job_id: &str) -> Result<(), SwarmError> {
        self.ensure_account(account, AccountKind::Client).await;
        let mut accounts = self.accounts.write().await;
        let state = accounts.get_mut(account).expect("just ensured");
        state.reserve(amount, job_id)?;
        Ok(())
    }

    async fn charge(&self, account: &str, amount: Cents, job_id: &str) -> Result<(), SwarmError> {
        let mut accounts = self.accounts.write().await;
        let state = accounts
            .get_mut(account)
            .ok_or_else(|| SwarmError::NotFound(format!("account {} not found", account)))?;
        if state.charge(amount, job_id)? {
            self.transactions.append(
                account.to_string(),
                TransactionKind::JobCharge,
                -amount.0,
                state.record.balance,
                Some(job_id.to_string()),
                crate::types::now_unix(),
            );
        }
        Ok(())
    }

    async fn refund(&self, account: &str, job_id: &str) -> Result<(), SwarmError> {
        let mut accounts = self.accounts.write().await;
        let state = accounts
            .get_mut(account)
            .ok_or_else(|| SwarmError::NotFound(format!("account {} not found", account)))?;
        if let Some(amount) = state.refund(job_id)? {
            self.transactions.append(
                account.to_string(),
                TransactionKind::JobRefund,
                0,
                state.record.balance,
                Some(job_id.to_string()),
                crate::types::now_unix(),
            );
            warn!(account, job_id, amount = %amount, "reservation refunded");
        }
        Ok(())
    }

    async fn credit(&self, account: &str, amount: Cents, job_id: &str, pending: bool) -> Result<(), SwarmError> {
        self.ensure_account(account, AccountKind::Worker).await;
        let mut accounts = self.accounts.write().await;
        let state = accounts.get_mut(account).expect("just ensured");
        if state.credit(amount, job_id, pending)? && !pending {
            self.transactions.append(
                account.to_string(),
                TransactionKind::Earning,
                amount.0,
                state.record.balance,
                Some(job_id.to_string()),
                crate::types::now_unix(),
            );
        }
        Ok(())
    }

    async fn balance_snapshot(&self, account: &str) -> Result<Account, SwarmError> {
        Ledger::balance_snapshot(self, account).await
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
        Ledger::seal_epoch(self, epoch_id, merkle_root, jobs_count, total_revenue, settlements, signature, sealed_at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deposit_reserve_charge_flow() {
        let ledger = Ledger::new();
        ledger.deposit("c1", Cents::from_dollars(1.0), "dep-1", 0).await.unwrap();
        LedgerClient::reserve(&ledger, "c1", Cents::from_dollars(0.10), "job-1").await.unwrap();
        LedgerClient::charge(&ledger, "c1", Cents::from_dollars(0.10), "job-1").await.unwrap();
        let snapshot = ledger.balance_snapshot("c1").await.unwrap();
        assert_eq!(snapshot.balance, Cents::from_dollars(0.90));
        assert_eq!(snapshot.reserved, Cents::ZERO);
    }

    #[tokio::test]
    async fn refund_restores_available_balance() {
        let ledger = Ledger::new();
        ledger.deposit("c1", Cents::from_dollars(1.0), "dep-1", 0).await.unwrap();
        LedgerClient::reserve(&ledger, "c1", Cents::from_dollars(0.10), "job-1").await.unwrap();
        LedgerClient::refund(&ledger, "c1", "job-1").await.unwrap();
        let snapshot = ledger.balance_snapshot("c1").await.unwrap();
        assert_eq!(snapshot.available(), Cents::from_dollars(1.0));
    }

    #[tokio::test]
    async fn seal_epoch_moves_pending_to_balance_and_rejects_reseal() {
        let ledger = Ledger::new();
        ledger.open_epoch("epoch-001".to_string(), 0).await;
        LedgerClient::credit(&ledger, "w1", Cents::from_dollars(0.07), "job-001-0001", true).await.unwrap();

        let settlements = vec![("w1".to_string(), Cents::from_dollars(0.07))];
        ledger
            .seal_epoch("epoch-001", "a".repeat(64), 1, Cents::from_dollars(0.10), settlements.clone(), "sig".to_string(), 100)
            .await
            .unwrap();

        let snapshot = ledger.balance_snapshot("w1").await.unwrap();
        assert_eq!(snapshot.balance, Cents::from_dollars(0.07));
        assert_eq!(snapshot.pending, Cents::ZERO);

        let result = ledger
            .seal_epoch("epoch-001", "b".repeat(64), 1, Cents::from_dollars(0.10), settlements, "sig2".to_string(), 200)
            .await;
        assert!(matches!(result, Err(SwarmError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn sealing_unknown_epoch_is_not_found() {
        let ledger = Ledger::new();
        let result = ledger
            .seal_epoch("epoch-ghost", "a".repeat(64), 0, Cents::ZERO, vec![], "sig".to_string(), 0)
            .await;
        assert!(matches!(result, Err(SwarmError::NotFound(_))));
    }
}
