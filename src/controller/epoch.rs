// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The epoch sealer: snapshots a retiring epoch's completed jobs, computes
//! the protocol/operator/readiness splits, signs and persists the bundle,
//! and hands the settlement list to the Ledger. Generalized from the
//! node's periodic settlement-submission task into a pull-based sealer the
//! bin entry point drives on a timer.

use super::dispatch::DispatchController;
use crate::cas::ContentStore;
use crate::config::SwarmConfig;
use crate::crypto::{epoch_seal_message, eip191_hash};
use crate::error::SwarmError;
use crate::ledger::bundle::{persist_bundle, EpochBundle};
use crate::ledger::epoch_seal::{compute_seal_plan, WorkerEpochStats};
use crate::ledger::LedgerClient;
use crate::receipt::build_tree;
use crate::types::{AccountId, Cents, Cid, WorkerStatus};
use k256::ecdsa::SigningKey;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

pub const PROTOCOL_TREASURY: &str = "treasury:protocol";
pub const OPERATOR_TREASURY: &str = "treasury:operator";

pub struct EpochSealer {
    controller: Arc<DispatchController>,
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn ContentStore>,
    config: Arc<SwarmConfig>,
    signing_key: SigningKey,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SealedEpoch {
    pub epoch_id: String,
    pub bundle_cid: Cid,
    pub jobs_count: u64,
    pub total_revenue: Cents,
}

impl EpochSealer {
    pub fn new(
        controller: Arc<DispatchController>,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn ContentStore>,
        config: Arc<SwarmConfig>,
        signing_key: SigningKey,
    ) -> Self {
        Self { controller, ledger, store, config, signing_key }
    }

    fn sign(&self, message: &str) -> String {
        let hash = eip191_hash(message);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&hash)
            .expect("signing a 32-byte prehash never fails");
        let mut compact = [0u8; 65];
        compact[..64].copy_from_slice(&signature.to_bytes());
        compact[64] = recovery_id.to_byte();
        hex::encode(compact)
    }

    /// Rotates the controller to a fresh epoch, seals the one just retired,
    /// and opens the new epoch on the Ledger side so job submission can
    /// continue uninterrupted.
    pub async fn seal_and_rotate(&self, sealed_at: i64) -> Result<SealedEpoch, SwarmError> {
        let epoch_id = self.controller.rotate_epoch().await;
        let next_epoch_id = self.controller.current_epoch_id().await;
        self.ledger.open_epoch(&next_epoch_id, sealed_at).await;
        self.seal(&epoch_id, sealed_at).await
    }

    async fn seal(&self, epoch_id: &str, sealed_at: i64) -> Result<SealedEpoch, SwarmError> {
        let jobs = self.controller.completed_jobs_in_epoch(epoch_id).await;
        let (sorted_jobs, tree) = build_tree(&jobs);
        let merkle_root_hex = hex::encode(tree.root());
        let total_revenue: Cents = sorted_jobs.iter().fold(Cents::ZERO, |acc, j| acc + j.fee);

        let worker_infos = self.controller.registry().all().await;
        let stats: Vec<WorkerEpochStats> = worker_infos
            .iter()
            .map(|w| WorkerEpochStats {
                worker: w.identity.clone(),
                qualifies_for_readiness: w.status != WorkerStatus::Offline,
            })
            .collect();
        let plan = compute_seal_plan(total_revenue, &stats, &self.config.fee_split);

        if plan.protocol_cut > Cents::ZERO {
            self.ledger
                .credit(PROTOCOL_TREASURY, plan.protocol_cut, &format!("{}-protocol", epoch_id), false)
                .await?;
        }
        if plan.operator_cut > Cents::ZERO {
            self.ledger
                .credit(OPERATOR_TREASURY, plan.operator_cut, &format!("{}-operator", epoch_id), false)
                .await?;
        }
        for (worker, share) in &plan.readiness_shares {
            if *share > Cents::ZERO {
                self.ledger
                    .credit(worker, *share, &format!("{}-readiness", epoch_id), true)
                    .await?;
            }
        }

        let mut settled_workers: HashSet<AccountId> = sorted_jobs.iter().filter_map(|j| j.worker.clone()).collect();
        settled_workers.extend(plan.readiness_shares.keys().cloned());

        let mut settlements: Vec<(AccountId, Cents)> = Vec::new();
        for worker in &settled_workers {
            let snapshot = self.ledger.balance_snapshot(worker).await?;
            if snapshot.pending > Cents::ZERO {
                settlements.push((worker.clone(), snapshot.pending));
            }
        }

        let sealed_iso = chrono::DateTime::<chrono::Utc>::from_timestamp(sealed_at, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        let message = epoch_seal_message(
            epoch_id,
            &merkle_root_hex,
            sorted_jobs.len() as u64,
            &total_revenue.to_string(),
            &sealed_iso,
        );
        let signature = self.sign(&message);

        let bundle = EpochBundle::new(
            epoch_id.to_string(),
            sorted_jobs.clone(),
            settlements.clone(),
            merkle_root_hex.clone(),
            signature.clone(),
            sealed_at,
        );
        let bundle_cid = persist_bundle(self.store.as_ref(), &bundle).await?;

        self.ledger
            .seal_epoch(
                epoch_id,
                merkle_root_hex,
                sorted_jobs.len() as u64,
                total_revenue,
                settlements,
                signature,
                sealed_at,
            )
            .await?;

        self.controller.registry().reset_epoch_counters().await;

        info!(epoch_id, jobs_count = sorted_jobs.len(), cid = %bundle_cid, "epoch bundle persisted and sealed");
        Ok(SealedEpoch {
            epoch_id: epoch_id.to_string(),
            bundle_cid,
            jobs_count: sorted_jobs.len() as u64,
            total_revenue,
        })
    }
}
