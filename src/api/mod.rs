// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! HTTP surfaces for the Controller and Ledger services.

pub mod controller_server;
pub mod ledger_server;

pub use controller_server::ControllerServer;
pub use ledger_server::LedgerServer;
