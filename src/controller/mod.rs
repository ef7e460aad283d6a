// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Dispatch Controller: owns `QueuedJob` and `WorkerInfo` state exclusively
//! (see `crate::ledger` for the matching note on the Ledger side) and
//! exposes submit/claim/complete/fail, worker registration and heartbeats,
//! and epoch rotation/sealing.

pub mod dispatch;
pub mod epoch;
pub mod queue;
pub mod registry;
pub mod sweeper;

pub use dispatch::{CompleteRequest, DispatchController, SubmitRequest, SubmitResponse};
pub use epoch::{EpochSealer, SealedEpoch};
pub use sweeper::Sweeper;
