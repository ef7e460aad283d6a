// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Settlement Ledger service entry point: serves the Ledger's HTTP surface
//! (balances, deposits, withdrawals, epoch bookkeeping, receipt verification)
//! on its own process and port, following the node's `#[tokio::main]` +
//! `tracing_subscriber::fmt::init()` + `tokio::signal::ctrl_c()` shutdown
//! shape in `src/main.rs`.

use anyhow::Result;
use clap::Parser;
use std::env;
use std::sync::Arc;
use swarmos::api::LedgerServer;
use swarmos::config::SwarmConfig;
use swarmos::ledger::Ledger;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "swarm-ledger", about = "SwarmOS Settlement Ledger")]
struct Args {
    /// Address to bind the Ledger's HTTP surface to.
    #[arg(long, env = "SWARMOS_LEDGER_ADDR")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = SwarmConfig::from_env();
    let listen_addr = args.listen.unwrap_or(config.ledger_listen_addr.clone());

    let ledger = Arc::new(Ledger::new());
    let server = Arc::new(LedgerServer::new(ledger));
    let app = server.router();

    info!(listen_addr, "settlement ledger listening");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("ledger received shutdown signal");
        })
        .await?;

    Ok(())
}
