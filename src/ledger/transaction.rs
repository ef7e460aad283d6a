// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The append-only transaction log: every value-moving event gets one
//! record here, in a single global order, generalized from the payment
//! tracker's per-account history vectors into one sequence shared by all
//! accounts so the whole ledger is replayable from this log alone.

use crate::types::{AccountId, Cents, Transaction, TransactionKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub struct TransactionLog {
    next_id: AtomicU64,
    entries: Mutex<Vec<Transaction>>,
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &self,
        account: AccountId,
        kind: TransactionKind,
        amount: i64,
        balance_after: Cents,
        reference: Option<String>,
        timestamp: i64,
    ) -> Transaction {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let tx = Transaction {
            id,
            account,
            kind,
            amount,
            balance_after,
            reference,
            timestamp,
        };
        self.entries.lock().expect("transaction log lock poisoned").push(tx.clone());
        tx
    }

    pub fn for_account(&self, account: &str) -> Vec<Transaction> {
        self.entries
            .lock()
            .expect("transaction log lock poisoned")
            .iter()
            .filter(|tx| tx.account == account)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Transaction> {
        self.entries.lock().expect("transaction log lock poisoned").clone()
    }

    /// Sum of signed amounts for `account`, which full reconstructability
    /// requires equal the account's current balance.
    pub fn reconstructed_balance(&self, account: &str) -> i64 {
        self.for_account(account).iter().map(|tx| tx.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonically_increasing() {
        let log = TransactionLog::new();
        let a = log.append("c1".to_string(), TransactionKind::Deposit, 100, Cents(100), None, 0);
        let b = log.append("c1".to_string(), TransactionKind::JobCharge, -10, Cents(90), None, 1);
        assert!(b.id > a.id);
    }

    #[test]
    fn reconstructed_balance_matches_sum_of_signed_amounts() {
        let log = TransactionLog::new();
        log.append("c1".to_string(), TransactionKind::Deposit, 100, Cents(100), None, 0);
        log.append("c1".to_string(), TransactionKind::JobCharge, -10, Cents(90), None, 1);
        assert_eq!(log.reconstructed_balance("c1"), 90);
    }

    #[test]
    fn filters_by_account() {
        let log = TransactionLog::new();
        log.append("c1".to_string(), TransactionKind::Deposit, 100, Cents(100), None, 0);
        log.append("c2".to_string(), TransactionKind::Deposit, 50, Cents(50), None, 1);
        assert_eq!(log.for_account("c1").len(), 1);
        assert_eq!(log.all().len(), 2);
    }
}
