// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The Worker Agent: registers with a Controller, heartbeats while alive,
//! and claims/executes/reports jobs until told to drain.

pub mod agent;
pub mod claim_loop;
pub mod client;
pub mod heartbeat;
pub mod inference;

pub use agent::{registration_message, verify_registration, AgentState, WorkerAgent};
pub use client::{ClaimRequest, ControllerClient, FailRequest, HeartbeatRequest, HttpControllerClient, RegisterRequest};
pub use inference::{HttpInference, Inference, InferenceOutcome};
