// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Epoch fee-split computation, generalized from the percentage-split
//! distribution pattern used for host/treasury/staker payment splits
//! elsewhere in this codebase into the §6 split: protocol fee, operator
//! fee, then the remainder divided between a work pool (credited per job
//! as it completes, see `crate::controller::dispatch`) and a readiness
//! pool (credited here, once per epoch, equally among qualifying workers).

use crate::config::FeeSplit;
use crate::types::{AccountId, Cents};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct WorkerEpochStats {
    pub worker: AccountId,
    /// Whether this worker's uptime this epoch met the configured minimum
    /// threshold and therefore qualifies for a readiness-pool share.
    pub qualifies_for_readiness: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealPlan {
    pub protocol_cut: Cents,
    pub operator_cut: Cents,
    pub readiness_pool_total: Cents,
    pub readiness_shares: HashMap<AccountId, Cents>,
}

/// Per-job work-pool share, credited as `pending` at job completion time
/// (see spec §4.1 `complete`): the work pool's fraction of the remainder
/// after protocol and operator cuts, applied to this single job's fee.
pub fn per_job_work_share(fee: Cents, split: &FeeSplit) -> Cents {
    let remainder_pct = 1.0 - split.protocol_pct - split.operator_pct;
    let share = fee.0 as f64 * remainder_pct * split.work_pool_pct;
    Cents(share.round() as i64)
}

/// Computes the epoch-level protocol/operator cuts and the equal split of
/// the readiness pool among qualifying workers. Leftover cents from integer
/// division are simply not distributed (documented as accepted dust).
pub fn compute_seal_plan(total_revenue: Cents, workers: &[WorkerEpochStats], split: &FeeSplit) -> SealPlan {
    let protocol_cut = Cents((total_revenue.0 as f64 * split.protocol_pct).round() as i64);
    let operator_cut = Cents((total_revenue.0 as f64 * split.operator_pct).round() as i64);
    let remainder = total_revenue - protocol_cut - operator_cut;
    let readiness_pool_total = Cents((remainder.0 as f64 * split.readiness_pool_pct).round() as i64);

    let qualifying: Vec<&AccountId> = workers
        .iter()
        .filter(|w| w.qualifies_for_readiness)
        .map(|w| &w.worker)
        .collect();

    let mut readiness_shares = HashMap::new();
    if !qualifying.is_empty() {
        let per_worker = Cents(readiness_pool_total.0 / qualifying.len() as i64);
        for worker in qualifying {
            readiness_shares.insert(worker.clone(), per_worker);
        }
    }

    SealPlan {
        protocol_cut,
        operator_cut,
        readiness_pool_total,
        readiness_shares,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_job_epoch_matches_documented_splits() {
        let split = FeeSplit::default();
        let fee = Cents::from_dollars(0.10);
        let work_share = per_job_work_share(fee, &split);
        // 0.10 * 0.93 * 0.70 = 0.0651 -> rounds to 7 cents at integer-cent
        // resolution; the spec's 4-decimal figure is the unrounded rational.
        assert_eq!(work_share, Cents(7));

        let plan = compute_seal_plan(
            fee,
            &[WorkerEpochStats { worker: "w1".to_string(), qualifies_for_readiness: true }],
            &split,
        );
        assert_eq!(plan.protocol_cut, Cents(0)); // 0.10 * 0.02 = 0.002 -> rounds to 0
        assert_eq!(plan.operator_cut, Cents(1)); // 0.10 * 0.05 = 0.005 -> rounds to 1
    }

    #[test]
    fn readiness_pool_splits_equally_among_qualifying_workers_only() {
        let split = FeeSplit::default();
        let plan = compute_seal_plan(
            Cents::from_dollars(10.0),
            &[
                WorkerEpochStats { worker: "w1".to_string(), qualifies_for_readiness: true },
                WorkerEpochStats { worker: "w2".to_string(), qualifies_for_readiness: true },
                WorkerEpochStats { worker: "w3".to_string(), qualifies_for_readiness: false },
            ],
            &split,
        );
        assert_eq!(plan.readiness_shares.len(), 2);
        assert!(!plan.readiness_shares.contains_key("w3"));
        let w1_share = plan.readiness_shares["w1"];
        let w2_share = plan.readiness_shares["w2"];
        assert_eq!(w1_share, w2_share);
    }

    #[test]
    fn empty_qualifying_set_yields_no_shares() {
        let split = FeeSplit::default();
        let plan = compute_seal_plan(Cents::from_dollars(10.0), &[], &split);
        assert!(plan.readiness_shares.is_empty());
    }
}
