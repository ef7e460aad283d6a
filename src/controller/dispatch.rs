// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Submit / claim / complete / fail: the Controller's core protocol, wired
//! against `LedgerClient` so it can be exercised against an in-memory
//! ledger double in tests, generalized from the way the node's job
//! processor is wired against a swappable contract client trait.

use super::queue::JobQueue;
use super::registry::WorkerRegistry;
use crate::config::SwarmConfig;
use crate::crypto::{job_complete_message, job_submit_message, recover_address};
use crate::error::SwarmError;
use crate::ledger::LedgerClient;
use crate::receipt::poe_hash;
use crate::retry::retry_with_backoff;
use crate::types::{
    now_unix, AccountId, Cid, EpochId, Job, JobId, JobStatus, QueuedJob, WorkerInfo, WorkerStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub client: AccountId,
    pub kind: String,
    pub input_ref: Cid,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub epoch_id: EpochId,
    pub fee: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub job_id: JobId,
    pub worker: AccountId,
    pub result_ref: Cid,
    pub poe_hash: String,
    pub execution_ms: u64,
    pub signature: String,
}

struct EpochCounter {
    epoch_number: u64,
    job_seq: u64,
}

impl EpochCounter {
    fn epoch_id(&self) -> EpochId {
        format!("epoch-{:03}", self.epoch_number)
    }
}

pub struct DispatchController {
    queue: JobQueue,
    registry: WorkerRegistry,
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    seen_nonces: Arc<RwLock<HashMap<AccountId, HashMap<String, i64>>>>,
    counter: Arc<RwLock<EpochCounter>>,
    config: Arc<SwarmConfig>,
    ledger: Arc<dyn LedgerClient>,
}

impl DispatchController {
    pub fn new(config: Arc<SwarmConfig>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            queue: JobQueue::new(),
            registry: WorkerRegistry::new(),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            seen_nonces: Arc::new(RwLock::new(HashMap::new())),
            counter: Arc::new(RwLock::new(EpochCounter { epoch_number: 1, job_seq: 0 })),
            config,
            ledger,
        }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub async fn current_epoch_id(&self) -> EpochId {
        self.counter.read().await.epoch_id()
    }

    async fn check_replay(&self, client: &str, nonce: &str, timestamp: i64, now: i64) -> Result<(), SwarmError> {
        if (now - timestamp).abs() > self.config.replay_window_secs {
            return Err(SwarmError::Unauthorized("stale or future timestamp".to_string()));
        }
        let mut seen = self.seen_nonces.write().await;
        let client_nonces = seen.entry(client.to_string()).or_default();
        client_nonces.retain(|_, ts| now - *ts <= self.config.replay_window_secs);
        if client_nonces.contains_key(nonce) {
            return Err(SwarmError::Conflict("nonce already used within replay window".to_string()));
        }
        client_nonces.insert(nonce.to_string(), now);
        Ok(())
    }

    pub async fn submit(&self, req: SubmitRequest) -> Result<SubmitResponse, SwarmError> {
        let now = now_unix();

        let message = job_submit_message(&req.kind, &req.client, &req.input_ref, req.timestamp, &req.nonce);
        let sig_bytes = hex::decode(req.signature.trim_start_matches("0x"))
            .map_err(|_| SwarmError::BadRequest("signature is not valid hex".to_string()))?;
        let recovered = recover_address(&message, &sig_bytes)
            .map_err(|e| SwarmError::Unauthorized(e.to_string()))?;
        if !recovered.eq_ignore_ascii_case(&req.client) {
            return Err(SwarmError::Unauthorized("signature does not match client".to_string()));
        }

        self.check_replay(&req.client, &req.nonce, req.timestamp, now).await?;

        let fee = crate::types::Cents(self.config.price_per_job_cents);
        let job_id = {
            let mut counter = self.counter.write().await;
            counter.job_seq += 1;
            format!("job-{:03}-{:04}", counter.epoch_number, counter.job_seq)
        };
        let epoch_id = self.current_epoch_id().await;

        retry_with_backoff(self.config.retry_attempts, self.config.retry_base_delay, || {
            self.ledger.reserve(&req.client, fee, &job_id)
        })
        .await?;

        let job = Job {
            job_id: job_id.clone(),
            epoch_id: epoch_id.clone(),
            client: req.client.clone(),
            worker: None,
            kind: req.kind.clone(),
            input_ref: req.input_ref.clone(),
            result_ref: None,
            fee,
            status: JobStatus::Queued,
            poe_hash: None,
            execution_ms: None,
            submitted_at: now,
            started_at: None,
            completed_at: None,
        };
        self.jobs.write().await.insert(job_id.clone(), job);

        self.queue
            .enqueue(QueuedJob {
                job_id: job_id.clone(),
                kind: req.kind,
                client: req.client,
                input_ref: req.input_ref,
                fee,
                enqueued_at: now,
                priority: 0,
            })
            .await;

        info!(job_id, epoch_id, "job submitted");
        Ok(SubmitResponse { job_id, epoch_id, fee: fee.to_string() })
    }

    pub async fn claim(&self, worker: &str) -> Result<Option<QueuedJob>, SwarmError> {
        let info = self
            .registry
            .get(worker)
            .await
            .ok_or_else(|| SwarmError::Forbidden("worker is not registered".to_string()))?;
        if info.status != WorkerStatus::Online {
            return Err(SwarmError::Forbidden(format!(
                "worker status {:?} cannot claim",
                info.status
            )));
        }

        let now = now_unix();
        let claimed = self.queue.claim(worker, now).await;
        if let Some(ref job) = claimed {
            let mut jobs = self.jobs.write().await;
            if let Some(record) = jobs.get_mut(&job.job_id) {
                record.status = JobStatus::Processing;
                record.worker = Some(worker.to_string());
                record.started_at = Some(now);
            }
            self.registry
                .heartbeat(worker, WorkerStatus::Busy, Some(job.job_id.clone()), now)
                .await;
        }
        Ok(claimed)
    }

    /// Idempotent on `job_id`: a retry after a successful completion
    /// returns `Ok(())` without charging or crediting twice.
    pub async fn complete(&self, req: CompleteRequest) -> Result<(), SwarmError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&req.job_id)
            .ok_or_else(|| SwarmError::NotFound(format!("job {} not found", req.job_id)))?;

        if job.status == JobStatus::Completed {
            return Ok(());
        }
        if job.status != JobStatus::Processing {
            return Err(SwarmError::PreconditionFailed(format!(
                "job {} is not processing",
                req.job_id
            )));
        }
        if job.worker.as_deref() != Some(req.worker.as_str()) {
            return Err(SwarmError::Forbidden("caller does not hold this job's claim".to_string()));
        }

        let expected_poe = poe_hash(&req.job_id, &req.result_ref, &req.worker);
        if expected_poe != req.poe_hash {
            return Err(SwarmError::Unauthorized("proof-of-execution hash mismatch".to_string()));
        }

        let message = job_complete_message(&req.job_id, &req.result_ref, &req.poe_hash);
        let sig_bytes = hex::decode(req.signature.trim_start_matches("0x"))
            .map_err(|_| SwarmError::BadRequest("signature is not valid hex".to_string()))?;
        let recovered = recover_address(&message, &sig_bytes)
            .map_err(|e| SwarmError::Unauthorized(e.to_string()))?;
        if !recovered.eq_ignore_ascii_case(&req.worker) {
            return Err(SwarmError::Unauthorized("signature does not match worker".to_string()));
        }

        let now = now_unix();
        job.status = JobStatus::Completed;
        job.result_ref = Some(req.result_ref);
        job.poe_hash = Some(req.poe_hash);
        job.execution_ms = Some(req.execution_ms);
        job.completed_at = Some(now);
        let fee = job.fee;
        let client = job.client.clone();
        drop(jobs);

        self.queue.finish(&req.job_id).await;

        retry_with_backoff(self.config.retry_attempts, self.config.retry_base_delay, || {
            self.ledger.charge(&client, fee, &req.job_id)
        })
        .await?;

        let work_share = crate::ledger::epoch_seal::per_job_work_share(fee, &self.config.fee_split);
        retry_with_backoff(self.config.retry_attempts, self.config.retry_base_delay, || {
            self.ledger.credit(&req.worker, work_share, &req.job_id, true)
        })
        .await?;

        self.registry.heartbeat(&req.worker, WorkerStatus::Online, None, now).await;
        self.registry.mark_job_completed(&req.worker).await;

        info!(job_id = %req.job_id, "job completed");
        Ok(())
    }

    /// Marks a job `failed` and refunds the client's reservation. Used both
    /// for an explicit worker-reported failure and for the claim-timeout
    /// sweep path.
    pub async fn fail(&self, job_id: &str, reason: &str) -> Result<(), SwarmError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| SwarmError::NotFound(format!("job {} not found", job_id)))?;

        if job.status == JobStatus::Failed {
            return Ok(());
        }
        if job.status == JobStatus::Completed {
            return Err(SwarmError::Conflict(format!("job {} already completed", job_id)));
        }

        job.status = JobStatus::Failed;
        let client = job.client.clone();
        let worker = job.worker.clone();
        drop(jobs);

        self.queue.finish(job_id).await;
        if let Some(worker) = worker {
            self.registry.heartbeat(&worker, WorkerStatus::Online, None, now_unix()).await;
        }

        retry_with_backoff(self.config.retry_attempts, self.config.retry_base_delay, || {
            self.ledger.refund(&client, job_id)
        })
        .await?;

        warn!(job_id, reason, "job failed");
        Ok(())
    }

    pub async fn register_worker(&self, info: WorkerInfo) {
        self.registry.register(info).await;
    }

    pub async fn heartbeat(&self, identity: &str, status: WorkerStatus, current_job_id: Option<JobId>) -> bool {
        self.registry.heartbeat(identity, status, current_job_id, now_unix()).await
    }

    pub async fn completed_jobs_in_epoch(&self, epoch_id: &str) -> Vec<Job> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| j.epoch_id == epoch_id && j.status == JobStatus::Completed)
            .cloned()
            .collect()
    }

    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Rotates to a fresh epoch, returning the id of the one being retired
    /// so the sealer can snapshot its completed jobs.
    pub async fn rotate_epoch(&self) -> EpochId {
        let mut counter = self.counter.write().await;
        let retiring = counter.epoch_id();
        counter.epoch_number += 1;
        counter.job_seq = 0;
        retiring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;
    use std::sync::Mutex as StdMutex;

    struct MockLedger {
        reserved: StdMutex<Vec<(String, crate::types::Cents, String)>>,
        charged: StdMutex<Vec<String>>,
        credited: StdMutex<Vec<(String, bool)>>,
        refunded: StdMutex<Vec<String>>,
        fail_reserve: bool,
    }

    impl MockLedger {
        fn new() -> Self {
            Self {
                reserved: StdMutex::new(Vec::new()),
                charged: StdMutex::new(Vec::new()),
                credited: StdMutex::new(Vec::new()),
                refunded: StdMutex::new(Vec::new()),
                fail_reserve: false,
            }
        }
    }

    #[async_trait]
    impl LedgerClient for MockLedger {
        async fn open_epoch(&self, _epoch_id: &str, _start_time: i64) {}

        async fn available(&self, _account: &str) -> Result<crate::types::Cents, SwarmError> {
            Ok(crate::types::Cents::from_dollars(1.0))
        }
        async fn reserve(&self, account: &str, amount: crate::types::Cents, job_id: &str) -> Result<(), SwarmError> {
            if self.fail_reserve {
                return Err(SwarmError::InsufficientFunds { available: "0".to_string(), required: amount.to_string() });
            }
            self.reserved.lock().unwrap().push((account.to_string(), amount, job_id.to_string()));
            Ok(())
        }
        async fn charge(&self, _account: &str, _amount: crate::types::Cents, job_id: &str) -> Result<(), SwarmError> {
            self.charged.lock().unwrap().push(job_id.to_string());
            Ok(())
        }
        async fn refund(&self, _account: &str, job_id: &str) -> Result<(), SwarmError> {
            self.refunded.lock().unwrap().push(job_id.to_string());
            Ok(())
        }
        async fn credit(&self, _account: &str, _amount: crate::types::Cents, job_id: &str, pending: bool) -> Result<(), SwarmError> {
            self.credited.lock().unwrap().push((job_id.to_string(), pending));
            Ok(())
        }
        async fn balance_snapshot(&self, account: &str) -> Result<crate::types::Account, SwarmError> {
            Ok(crate::types::Account::new(account.to_string(), crate::types::AccountKind::Client))
        }
        async fn seal_epoch(
            &self,
            _epoch_id: &str,
            _merkle_root: String,
            _jobs_count: u64,
            _total_revenue: crate::types::Cents,
            _settlements: Vec<(AccountId, crate::types::Cents)>,
            _signature: String,
            _sealed_at: i64,
        ) -> Result<(), SwarmError> {
            Ok(())
        }
    }

    fn signed_submit(signing_key: &SigningKey, client: &str, kind: &str, input_ref: &str, ts: i64, nonce: &str) -> SubmitRequest {
        let message = job_submit_message(kind, client, input_ref, ts, nonce);
        let hash = crate::crypto::eip191_hash(&message);
        let (signature, recovery_id) = signing_key.sign_prehash_recoverable(&hash).unwrap();
        let mut compact = [0u8; 65];
        compact[..64].copy_from_slice(&signature.to_bytes());
        compact[64] = recovery_id.to_byte();
        SubmitRequest {
            client: client.to_string(),
            kind: kind.to_string(),
            input_ref: input_ref.to_string(),
            timestamp: ts,
            nonce: nonce.to_string(),
            signature: hex::encode(compact),
        }
    }

    fn address_for(signing_key: &SigningKey) -> String {
        let verifying_key = signing_key.verifying_key();
        let public_key = k256::PublicKey::from(verifying_key);
        let encoded = public_key.to_encoded_point(false);
        use tiny_keccak::{Hasher, Keccak};
        let mut hasher = Keccak::v256();
        let mut hash = [0u8; 32];
        hasher.update(&encoded.as_bytes()[1..]);
        hasher.finalize(&mut hash);
        format!("0x{}", hex::encode(&hash[12..]))
    }

    fn signed_complete(signing_key: &SigningKey, job_id: &str, worker: &str, result_ref: &str, poe: &str, execution_ms: u64) -> CompleteRequest {
        let message = job_complete_message(job_id, result_ref, poe);
        let hash = crate::crypto::eip191_hash(&message);
        let (signature, recovery_id) = signing_key.sign_prehash_recoverable(&hash).unwrap();
        let mut compact = [0u8; 65];
        compact[..64].copy_from_slice(&signature.to_bytes());
        compact[64] = recovery_id.to_byte();
        CompleteRequest {
            job_id: job_id.to_string(),
            worker: worker.to_string(),
            result_ref: result_ref.to_string(),
            poe_hash: poe.to_string(),
            execution_ms,
            signature: hex::encode(compact),
        }
    }

    fn controller() -> (DispatchController, Arc<MockLedger>) {
        let ledger = Arc::new(MockLedger::new());
        let controller = DispatchController::new(Arc::new(SwarmConfig::default()), ledger.clone());
        (controller, ledger)
    }

    #[tokio::test]
    async fn submit_allocates_job_and_reserves_fee() {
        let (controller, ledger) = controller();
        let signing_key = SigningKey::random(&mut OsRng);
        let client = address_for(&signing_key);
        let now = now_unix();
        let req = signed_submit(&signing_key, &client, "spine-mri", "cid-in", now, "n1");

        let resp = controller.submit(req).await.unwrap();
        assert_eq!(resp.job_id, "job-001-0001");
        assert_eq!(ledger.reserved.lock().unwrap().len(), 1);
        assert_eq!(controller.queue().pending_len().await, 1);
    }

    #[tokio::test]
    async fn submit_rejects_replayed_nonce() {
        let (controller, _ledger) = controller();
        let signing_key = SigningKey::random(&mut OsRng);
        let client = address_for(&signing_key);
        let now = now_unix();
        let req1 = signed_submit(&signing_key, &client, "spine-mri", "cid-in", now, "n1");
        let req2 = signed_submit(&signing_key, &client, "spine-mri", "cid-in", now, "n1");

        controller.submit(req1).await.unwrap();
        let result = controller.submit(req2).await;
        assert!(matches!(result, Err(SwarmError::Conflict(_))));
    }

    #[tokio::test]
    async fn submit_rejects_mismatched_signature() {
        let (controller, _ledger) = controller();
        let signing_key = SigningKey::random(&mut OsRng);
        let now = now_unix();
        let req = signed_submit(&signing_key, "0xnotthesigner", "spine-mri", "cid-in", now, "n1");
        let result = controller.submit(req).await;
        assert!(matches!(result, Err(SwarmError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn claim_requires_registered_online_worker() {
        let (controller, _ledger) = controller();
        let result = controller.claim("ghost").await;
        assert!(matches!(result, Err(SwarmError::Forbidden(_))));
    }

    #[tokio::test]
    async fn claim_moves_job_to_processing_and_busy() {
        let (controller, _ledger) = controller();
        let signing_key = SigningKey::random(&mut OsRng);
        let client = address_for(&signing_key);
        let now = now_unix();
        let req = signed_submit(&signing_key, &client, "spine-mri", "cid-in", now, "n1");
        controller.submit(req).await.unwrap();

        controller.register_worker(WorkerInfo::new("w1".to_string(), "rtx-4090".to_string(), 24, "http://x".to_string(), now)).await;
        let claimed = controller.claim("w1").await.unwrap().unwrap();
        let job = controller.job(&claimed.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(controller.registry().get("w1").await.unwrap().status, WorkerStatus::Busy);
    }

    #[tokio::test]
    async fn complete_is_idempotent() {
        let (controller, ledger) = controller();
        let signing_key = SigningKey::random(&mut OsRng);
        let client = address_for(&signing_key);
        let now = now_unix();
        let req = signed_submit(&signing_key, &client, "spine-mri", "cid-in", now, "n1");
        let submitted = controller.submit(req).await.unwrap();

        let worker_key = SigningKey::random(&mut OsRng);
        let worker = address_for(&worker_key);
        controller.register_worker(WorkerInfo::new(worker.clone(), "rtx-4090".to_string(), 24, "http://x".to_string(), now)).await;
        controller.claim(&worker).await.unwrap();

        let result_ref = "cid-out".to_string();
        let poe = poe_hash(&submitted.job_id, &result_ref, &worker);
        let complete_req = signed_complete(&worker_key, &submitted.job_id, &worker, &result_ref, &poe, 1000);

        controller.complete(complete_req.clone()).await.unwrap();
        controller.complete(complete_req).await.unwrap();
        assert_eq!(ledger.charged.lock().unwrap().len(), 1);
        assert_eq!(ledger.credited.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn complete_rejects_signature_from_a_different_key() {
        let (controller, _ledger) = controller();
        let signing_key = SigningKey::random(&mut OsRng);
        let client = address_for(&signing_key);
        let now = now_unix();
        let req = signed_submit(&signing_key, &client, "spine-mri", "cid-in", now, "n1");
        let submitted = controller.submit(req).await.unwrap();

        let worker_key = SigningKey::random(&mut OsRng);
        let worker = address_for(&worker_key);
        controller.register_worker(WorkerInfo::new(worker.clone(), "rtx-4090".to_string(), 24, "http://x".to_string(), now)).await;
        controller.claim(&worker).await.unwrap();

        let result_ref = "cid-out".to_string();
        let poe = poe_hash(&submitted.job_id, &result_ref, &worker);
        let impostor_key = SigningKey::random(&mut OsRng);
        let forged = signed_complete(&impostor_key, &submitted.job_id, &worker, &result_ref, &poe, 1000);

        let result = controller.complete(forged).await;
        assert!(matches!(result, Err(SwarmError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn fail_refunds_and_is_idempotent() {
        let (controller, ledger) = controller();
        let signing_key = SigningKey::random(&mut OsRng);
        let client = address_for(&signing_key);
        let now = now_unix();
        let req = signed_submit(&signing_key, &client, "spine-mri", "cid-in", now, "n1");
        let submitted = controller.submit(req).await.unwrap();

        controller.fail(&submitted.job_id, "worker crashed").await.unwrap();
        controller.fail(&submitted.job_id, "worker crashed").await.unwrap();
        assert_eq!(ledger.refunded.lock().unwrap().len(), 1);
    }
}
