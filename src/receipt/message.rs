// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! The two canonical signing message formats used by receipts: the
//! job-submit message embedded in a job's provenance and the epoch-seal
//! message the Ledger signs when finalizing an epoch. Construction lives in
//! `crate::crypto` alongside the recovery routine that verifies them; this
//! module re-exports them under the name receipts refer to them by.

pub use crate::crypto::{epoch_seal_message, job_submit_message};
