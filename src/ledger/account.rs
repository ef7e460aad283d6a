// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Per-account balance state machine, generalized from the payment
//! tracker's running-totals and the payment system's pending-withdrawal
//! lifecycle into a single in-process ledger entry. Every mutating method
//! is idempotent on the key named in its doc comment, enforced by a
//! dedup set carried alongside the account's balances.

use crate::error::SwarmError;
use crate::types::{Account, AccountKind, Cents, JobId, WithdrawalStatus};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct WithdrawalRecord {
    pub amount: Cents,
    pub destination: String,
    pub status: WithdrawalStatus,
    pub external_tx: Option<String>,
}

/// Wraps the plain data-model `Account` with the operational dedup state
/// needed to make every mutating call idempotent, per the data-model
/// ownership note ("Ledger exclusively owns Account... state").
#[derive(Debug, Clone)]
pub struct AccountState {
    pub record: Account,
    /// job_id -> amount held, so a refund releases exactly that job's hold
    /// even when other jobs have concurrent reservations outstanding.
    reserved_jobs: HashMap<JobId, Cents>,
    charged_jobs: HashSet<JobId>,
    refunded_jobs: HashSet<JobId>,
    credited: HashSet<(JobId, bool)>,
    deposited_refs: HashSet<String>,
    withdrawals: HashMap<String, WithdrawalRecord>,
}

impl AccountState {
    pub fn new(id: String, kind: AccountKind) -> Self {
        Self {
            record: Account::new(id, kind),
            reserved_jobs: HashMap::new(),
            charged_jobs: HashSet::new(),
            refunded_jobs: HashSet::new(),
            credited: HashSet::new(),
            deposited_refs: HashSet::new(),
            withdrawals: HashMap::new(),
        }
    }

    /// Idempotent on `external_ref`. Returns `true` if this call actually
    /// applied the deposit (for transaction-log bookkeeping by the caller).
    pub fn deposit(&mut self, amount: Cents, external_ref: &str) -> Result<bool, SwarmError> {
        if self.deposited_refs.contains(external_ref) {
            return Ok(false);
        }
        self.record.balance = self.record.balance + amount;
        self.record.total_in = self.record.total_in + amount;
        self.deposited_refs.insert(external_ref.to_string());
        Ok(true)
    }

    /// Idempotent on `job_id`.
    pub fn reserve(&mut self, amount: Cents, job_id: &str) -> Result<bool, SwarmError> {
        if self.reserved_jobs.contains_key(job_id) {
            return Ok(false);
        }
        if self.record.available() < amount {
            return Err(SwarmError::InsufficientFunds {
                available: self.record.available().to_string(),
                required: amount.to_string(),
            });
        }
        self.record.reserved = self.record.reserved + amount;
        self.reserved_jobs.insert(job_id.to_string(), amount);
        Ok(true)
    }

    /// Idempotent on `job_id`. Fails unless a matching `reserve` preceded it.
    pub fn charge(&mut self, amount: Cents, job_id: &str) -> Result<bool, SwarmError> {
        if self.charged_jobs.contains(job_id) {
            return Ok(false);
        }
        let reserved_amount = self.reserved_jobs.get(job_id).copied().ok_or_else(|| {
            SwarmError::PreconditionFailed(format!("no reservation found for job {}", job_id))
        })?;
        if self.refunded_jobs.contains(job_id) {
            return Err(SwarmError::Conflict(format!(
                "job {} was already refunded",
                job_id
            )));
        }
        self.record.reserved = self.record.reserved - reserved_amount;
        self.record.balance = self.record.balance - amount;
        self.record.total_out = self.record.total_out + amount;
        self.charged_jobs.insert(job_id.to_string());
        Ok(true)
    }

    /// Idempotent on `job_id`. Fails unless a reservation exists and the job
    /// has not already been charged. Releases exactly this job's hold, so
    /// other jobs' concurrent reservations on the same account are untouched.
    pub fn refund(&mut self, job_id: &str) -> Result<Option<Cents>, SwarmError> {
        if self.refunded_jobs.contains(job_id) {
            return Ok(None);
        }
        let amount = self.reserved_jobs.get(job_id).copied().ok_or_else(|| {
            SwarmError::PreconditionFailed(format!("no reservation found for job {}", job_id))
        })?;
        if self.charged_jobs.contains(job_id) {
            return Err(SwarmError::Conflict(format!(
                "job {} was already charged",
                job_id
            )));
        }
        self.record.reserved = self.record.reserved - amount;
        self.refunded_jobs.insert(job_id.to_string());
        Ok(Some(amount))
    }

    /// Idempotent on `(account, job_id)` as seen by the caller; the `pending`
    /// flag is part of the dedup key so a job's work-pool credit and an
    /// epoch's readiness credit (same job_id namespace, different flag)
    /// never collide.
    pub fn credit(&mut self, amount: Cents, job_id: &str, pending: bool) -> Result<bool, SwarmError> {
        let key = (job_id.to_string(), pending);
        if self.credited.contains(&key) {
            return Ok(false);
        }
        if pending {
            self.record.pending = self.record.pending + amount;
        } else {
            self.record.balance = self.record.balance + amount;
            self.record.total_in = self.record.total_in + amount;
        }
        self.credited.insert(key);
        Ok(true)
    }

    /// Moves `amount` from `pending` to `balance`, used only by epoch
    /// sealing. Not idempotency-tracked here: the epoch-level idempotency
    /// guard lives on the `Epoch` record itself.
    pub fn finalize_pending(&mut self, amount: Cents) {
        self.record.pending = self.record.pending - amount;
        self.record.balance = self.record.balance + amount;
        self.record.total_in = self.record.total_in + amount;
    }

    pub fn withdraw_request(
        &mut self,
        withdrawal_id: &str,
        amount: Cents,
        destination: &str,
    ) -> Result<bool, SwarmError> {
        if self.withdrawals.contains_key(withdrawal_id) {
            return Ok(false);
        }
        if self.record.available() < amount {
            return Err(SwarmError::InsufficientFunds {
                available: self.record.available().to_string(),
                required: amount.to_string(),
            });
        }
        self.record.reserved = self.record.reserved + amount;
        self.withdrawals.insert(
            withdrawal_id.to_string(),
            WithdrawalRecord {
                amount,
                destination: destination.to_string(),
                status: WithdrawalStatus::Pending,
                external_tx: None,
            },
        );
        Ok(true)
    }

    /// Idempotent on `withdrawal_id`. Returns the finalized amount when this
    /// call actually applied the transition, `None` on a repeat.
    pub fn withdraw_finalize(&mut self, withdrawal_id: &str, external_tx: &str) -> Result<Option<Cents>, SwarmError> {
        let record = self
            .withdrawals
            .get_mut(withdrawal_id)
            .ok_or_else(|| SwarmError::NotFound(format!("withdrawal {} not found", withdrawal_id)))?;
        if record.status == WithdrawalStatus::Finalized {
            return Ok(None);
        }
        let amount = record.amount;
        self.record.reserved = self.record.reserved - amount;
        self.record.balance = self.record.balance - amount;
        self.record.total_out = self.record.total_out + amount;
        record.status = WithdrawalStatus::Finalized;
        record.external_tx = Some(external_tx.to_string());
        Ok(Some(amount))
    }

    pub fn invariant_holds(&self) -> bool {
        self.record.invariant_holds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AccountState {
        let mut a = AccountState::new("xyz.example".to_string(), AccountKind::Client);
        a.deposit(Cents::from_dollars(1.00), "dep-1").unwrap();
        a
    }

    #[test]
    fn deposit_is_idempotent_on_external_ref() {
        let mut a = AccountState::new("c1".to_string(), AccountKind::Client);
        assert!(a.deposit(Cents::from_dollars(1.0), "ref-1").unwrap());
        assert!(!a.deposit(Cents::from_dollars(1.0), "ref-1").unwrap());
        assert_eq!(a.record.balance, Cents::from_dollars(1.0));
    }

    #[test]
    fn reserve_then_charge_matches_charge_alone_on_available() {
        let mut a = client();
        a.reserve(Cents::from_dollars(0.10), "job-1").unwrap();
        a.charge(Cents::from_dollars(0.10), "job-1").unwrap();
        let available_via_reserve_charge = a.record.available();

        let mut b = client();
        b.reserve(Cents::from_dollars(0.10), "job-1").unwrap();
        b.charge(Cents::from_dollars(0.10), "job-1").unwrap();
        assert_eq!(available_via_reserve_charge, b.record.available());
        assert_eq!(a.record.balance, Cents::from_dollars(0.90));
    }

    #[test]
    fn reserve_then_refund_is_a_no_op_on_available() {
        let mut a = client();
        let before = a.record.available();
        a.reserve(Cents::from_dollars(0.10), "job-1").unwrap();
        a.refund("job-1").unwrap();
        assert_eq!(a.record.available(), before);
    }

    #[test]
    fn refund_of_one_job_leaves_other_concurrent_reservations_intact() {
        let mut a = client();
        a.reserve(Cents::from_dollars(0.10), "job-1").unwrap();
        a.reserve(Cents::from_dollars(0.20), "job-2").unwrap();
        a.refund("job-1").unwrap();
        assert_eq!(a.record.reserved, Cents::from_dollars(0.20));
        a.charge(Cents::from_dollars(0.20), "job-2").unwrap();
        assert_eq!(a.record.reserved, Cents::ZERO);
        assert_eq!(a.record.balance, Cents::from_dollars(0.80));
    }

    #[test]
    fn charge_without_reservation_fails() {
        let mut a = client();
        assert!(a.charge(Cents::from_dollars(0.10), "job-1").is_err());
    }

    #[test]
    fn insufficient_funds_rejects_reserve() {
        let mut a = AccountState::new("c1".to_string(), AccountKind::Client);
        let result = a.reserve(Cents::from_dollars(1.0), "job-1");
        assert!(matches!(result, Err(SwarmError::InsufficientFunds { .. })));
    }

    #[test]
    fn charge_is_idempotent_and_does_not_double_charge() {
        let mut a = client();
        a.reserve(Cents::from_dollars(0.10), "job-1").unwrap();
        assert!(a.charge(Cents::from_dollars(0.10), "job-1").unwrap());
        assert!(!a.charge(Cents::from_dollars(0.10), "job-1").unwrap());
        assert_eq!(a.record.balance, Cents::from_dollars(0.90));
    }

    #[test]
    fn withdraw_finalize_is_idempotent() {
        let mut worker = AccountState::new("w1".to_string(), AccountKind::Worker);
        worker.credit(Cents::from_dollars(5.0), "epoch-001-readiness", false).unwrap();
        assert!(worker.withdraw_request("wd-1", Cents::from_dollars(5.0), "addr").unwrap());
        assert!(worker.withdraw_finalize("wd-1", "tx-1").unwrap().is_some());
        assert!(worker.withdraw_finalize("wd-1", "tx-1").unwrap().is_none());
        assert_eq!(worker.record.balance, Cents::ZERO);
    }

    #[test]
    fn invariant_holds_after_typical_sequence() {
        let mut a = client();
        a.reserve(Cents::from_dollars(0.10), "job-1").unwrap();
        assert!(a.invariant_holds());
        a.charge(Cents::from_dollars(0.10), "job-1").unwrap();
        assert!(a.invariant_holds());
    }
}
