// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The Worker Agent's lifecycle: `unregistered -> registering -> idle <->
//! processing -> draining -> stopped`, generalized from `JobClaimer`'s
//! claim-loop shape into a full state machine that also owns registration
//! and heartbeating. `WorkerAgent` is the shared handle both the heartbeat
//! task and the claim loop run against.

use super::client::{ControllerClient, RegisterRequest};
use super::inference::Inference;
use crate::config::SwarmConfig;
use crate::crypto::{eip191_hash, recover_address};
use crate::error::SwarmError;
use crate::types::{AccountId, JobId};
use k256::ecdsa::SigningKey;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Unregistered,
    Registering,
    Idle,
    Processing,
    Draining,
    Stopped,
}

/// `"SwarmOS Worker Registration\nIdentity: {id}\nEndpoint: {endpoint}"` —
/// not one of the two message formats the receipt/controller layer hashes
/// into a job or epoch, just the proof-of-identity the registration
/// handshake checks, following the same `format!`-then-hash style as
/// `crate::crypto`'s other message constructors.
pub fn registration_message(identity: &str, endpoint: &str) -> String {
    format!("SwarmOS Worker Registration\nIdentity: {}\nEndpoint: {}", identity, endpoint)
}

pub struct WorkerAgent {
    pub identity: AccountId,
    pub gpu_model: String,
    pub vram_gb: u32,
    pub endpoint: String,
    pub(crate) config: Arc<SwarmConfig>,
    pub(crate) client: Arc<dyn ControllerClient>,
    pub(crate) inference: Arc<dyn Inference>,
    signing_key: SigningKey,
    state: RwLock<AgentState>,
    current_job: RwLock<Option<JobId>>,
    consecutive_heartbeat_failures: AtomicU32,
}

impl WorkerAgent {
    pub fn new(
        identity: AccountId,
        gpu_model: String,
        vram_gb: u32,
        endpoint: String,
        config: Arc<SwarmConfig>,
        client: Arc<dyn ControllerClient>,
        inference: Arc<dyn Inference>,
        signing_key: SigningKey,
    ) -> Self {
        Self {
            identity,
            gpu_model,
            vram_gb,
            endpoint,
            config,
            client,
            inference,
            signing_key,
            state: RwLock::new(AgentState::Unregistered),
            current_job: RwLock::new(None),
            consecutive_heartbeat_failures: AtomicU32::new(0),
        }
    }

    pub async fn state(&self) -> AgentState {
        *self.state.read().await
    }

    pub(crate) async fn set_state(&self, state: AgentState) {
        let mut guard = self.state.write().await;
        if *guard != state {
            info!(identity = %self.identity, from = ?*guard, to = ?state, "agent state transition");
        }
        *guard = state;
    }

    pub(crate) async fn current_job(&self) -> Option<JobId> {
        self.current_job.read().await.clone()
    }

    pub(crate) async fn set_current_job(&self, job_id: Option<JobId>) {
        *self.current_job.write().await = job_id;
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

    pub(crate) fn sign_message(&self, message: &str) -> String {
        self.sign(message)
    }

    pub(crate) fn record_heartbeat_result(&self, ok: bool) -> u32 {
        if ok {
            self.consecutive_heartbeat_failures.store(0, Ordering::SeqCst);
            0
        } else {
            self.consecutive_heartbeat_failures.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    /// Sends a signed registration request and, on success, transitions
    /// `unregistered -> registering -> idle`.
    pub async fn register(&self) -> Result<(), SwarmError> {
        self.set_state(AgentState::Registering).await;
        let message = registration_message(&self.identity, &self.endpoint);
        let signature = self.sign(&message);
        self.client
            .register(RegisterRequest {
                identity: self.identity.clone(),
                gpu_model: self.gpu_model.clone(),
                vram_gb: self.vram_gb,
                endpoint: self.endpoint.clone(),
                signature,
            })
            .await?;
        self.set_state(AgentState::Idle).await;
        Ok(())
    }

    /// Transitions to `draining`: stops new claims, lets any in-flight job
    /// finish, and the caller should await the claim loop's exit before
    /// considering the agent `stopped`.
    pub async fn begin_draining(&self) {
        self.set_state(AgentState::Draining).await;
    }

    pub async fn stop(&self) {
        self.set_state(AgentState::Stopped).await;
    }

    pub(crate) async fn set_state_processing(&self) {
        self.set_state(AgentState::Processing).await;
    }

    pub(crate) async fn set_state_idle(&self) {
        self.set_state(AgentState::Idle).await;
    }

    #[cfg(test)]
    pub(crate) async fn force_idle_for_test(&self) {
        self.set_state(AgentState::Idle).await;
    }

    /// Runs the heartbeat task and the claim loop concurrently until
    /// `shutdown` fires or the agent drains itself (three consecutive
    /// heartbeat failures). Registers first if not already registered.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        if self.state().await == AgentState::Unregistered {
            if let Err(e) = self.register().await {
                tracing::error!(identity = %self.identity, error = %e, "worker registration failed");
                return;
            }
        }

        let heartbeat_agent = self.clone();
        let heartbeat_shutdown = shutdown.clone();
        let heartbeat_handle =
            tokio::spawn(async move { super::heartbeat::run_heartbeat_loop(heartbeat_agent, heartbeat_shutdown).await });

        let claim_agent = self.clone();
        let claim_shutdown = shutdown.clone();
        let claim_handle = tokio::spawn(async move { super::claim_loop::run_claim_loop(claim_agent, claim_shutdown).await });

        let _ = tokio::join!(heartbeat_handle, claim_handle);
        self.stop().await;
    }
}

/// Recovers the address bound to `signature` over the registration message,
/// used by the Controller's `/workers/register` handler to authenticate an
/// inbound registration the same way `submit` authenticates a job.
pub fn verify_registration(identity: &str, endpoint: &str, signature_hex: &str) -> Result<(), SwarmError> {
    let message = registration_message(identity, endpoint);
    let sig_bytes = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|_| SwarmError::BadRequest("signature is not valid hex".to_string()))?;
    let recovered =
        recover_address(&message, &sig_bytes).map_err(|e| SwarmError::Unauthorized(e.to_string()))?;
    if !recovered.eq_ignore_ascii_case(identity) {
        return Err(SwarmError::Unauthorized("signature does not match worker identity".to_string()));
    }
    Ok(())
}
