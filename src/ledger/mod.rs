// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Settlement Ledger: single source of truth for every account's balance
//! and every value-changing event. Owns `Account`, `Transaction`,
//! `Deposit`, `Withdrawal`, and `Epoch` state exclusively; never imports
//! `crate::controller`.

pub mod account;
pub mod bundle;
pub mod client;
pub mod epoch_seal;
#[allow(clippy::module_inception)]
pub mod ledger;
pub mod transaction;

pub use client::HttpLedgerClient;
pub use ledger::{Ledger, LedgerClient};
