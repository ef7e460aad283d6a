// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Dispatch Controller service entry point: serves job submission/claim/
//! completion and worker registration/heartbeat over HTTP, sweeps stale
//! workers and claims in the background, and seals epochs on a timer,
//! talking to the Settlement Ledger over `HttpLedgerClient` so the two
//! services can run as independent processes. Shape follows the node's
//! `#[tokio::main]` + `tokio::signal::ctrl_c()` graceful shutdown in
//! `src/main.rs`.

use anyhow::{Context, Result};
use clap::Parser;
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use std::env;
use std::sync::Arc;
use swarmos::api::ControllerServer;
use swarmos::cas::InMemoryStore;
use swarmos::config::SwarmConfig;
use swarmos::controller::{DispatchController, EpochSealer, Sweeper};
use swarmos::crypto::address_from_signing_key;
use swarmos::ledger::{HttpLedgerClient, LedgerClient};
use swarmos::types::now_unix;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "swarm-controller", about = "SwarmOS Dispatch Controller")]
struct Args {
    /// Address to bind the Controller's HTTP surface to.
    #[arg(long, env = "SWARMOS_CONTROLLER_ADDR")]
    listen: Option<String>,
    /// Base URL of the Settlement Ledger this controller settles against.
    #[arg(long, env = "SWARMOS_LEDGER_URL", default_value = "http://127.0.0.1:8081")]
    ledger_url: String,
    /// Hex-encoded secp256k1 private key used to sign epoch-seal messages.
    /// A random key is generated (and logged) if unset, which is only
    /// suitable for local development since it does not persist.
    #[arg(long, env = "SWARMOS_CONTROLLER_PRIVATE_KEY")]
    private_key: Option<String>,
}

fn load_or_generate_signing_key(hex_key: Option<String>) -> SigningKey {
    match hex_key {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key.trim_start_matches("0x")).expect("private key must be valid hex");
            SigningKey::from_slice(&bytes).expect("private key must be a valid secp256k1 scalar")
        }
        None => {
            tracing::warn!("no SWARMOS_CONTROLLER_PRIVATE_KEY set, generating an ephemeral signing key");
            SigningKey::random(&mut OsRng)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Arc::new(SwarmConfig::from_env());
    let listen_addr = args.listen.unwrap_or(config.controller_listen_addr.clone());

    let signing_key = load_or_generate_signing_key(args.private_key);
    info!(identity = %address_from_signing_key(&signing_key), "controller signing identity");

    let ledger = Arc::new(HttpLedgerClient::new(args.ledger_url.clone()));
    let store = Arc::new(InMemoryStore::new());

    let controller = Arc::new(DispatchController::new(config.clone(), ledger.clone()));
    let sealer = Arc::new(EpochSealer::new(controller.clone(), ledger.clone(), store, config.clone(), signing_key));

    let initial_epoch = controller.current_epoch_id().await;
    ledger.open_epoch(&initial_epoch, now_unix()).await;
    info!(epoch = %initial_epoch, ledger_url = %args.ledger_url, "opened initial epoch on ledger");

    let sweeper = Arc::new(Sweeper::new(controller.clone(), config.clone()));
    let _sweeper_handle = sweeper.spawn();

    let seal_interval = config.epoch_seal_interval_secs;
    let seal_sealer = sealer.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(seal_interval));
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            match seal_sealer.seal_and_rotate(now_unix()).await {
                Ok(sealed) => info!(epoch = %sealed.epoch_id, jobs = sealed.jobs_count, "sealed epoch on schedule"),
                Err(e) => tracing::error!(error = %e, "scheduled epoch seal failed"),
            }
        }
    });

    let server = Arc::new(ControllerServer::new(controller, sealer));
    let app = server.router();

    info!(listen_addr, "dispatch controller listening");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await.context("binding controller listen address")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("controller received shutdown signal");
        })
        .await?;

    Ok(())
}
