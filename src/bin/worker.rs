// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Worker Agent service entry point: registers with a Controller, then
//! heartbeats and claims/executes/reports jobs until told to drain, shape
//! following the node's `#[tokio::main]` + `tokio::signal::ctrl_c()`
//! graceful shutdown in `src/main.rs`.

use anyhow::Result;
use clap::Parser;
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use std::env;
use std::sync::Arc;
use swarmos::config::SwarmConfig;
use swarmos::crypto::address_from_signing_key;
use swarmos::worker::{HttpControllerClient, HttpInference, Inference, WorkerAgent};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "swarm-worker", about = "SwarmOS Worker Agent")]
struct Args {
    /// Base URL of the Dispatch Controller this worker registers with.
    #[arg(long, env = "SWARMOS_CONTROLLER_URL", default_value = "http://127.0.0.1:8080")]
    controller_url: String,
    /// Address other services can reach this worker at. Informational only
    /// today, but signed into the registration handshake so it cannot be
    /// tampered with in flight.
    #[arg(long, env = "SWARMOS_WORKER_ENDPOINT", default_value = "http://127.0.0.1:9000")]
    endpoint: String,
    /// GPU model string advertised at registration (e.g. "RTX 4090").
    #[arg(long, env = "SWARMOS_WORKER_GPU_MODEL", default_value = "unknown")]
    gpu_model: String,
    /// VRAM in GB advertised at registration.
    #[arg(long, env = "SWARMOS_WORKER_VRAM_GB", default_value_t = 0)]
    vram_gb: u32,
    /// URL of the inference sidecar this worker executes claimed jobs against.
    #[arg(long, env = "SWARMOS_INFERENCE_URL")]
    inference_url: Option<String>,
    /// Hex-encoded secp256k1 private key identifying this worker. A random
    /// key is generated (and logged) if unset, which is only suitable for
    /// local development since it does not persist across restarts.
    #[arg(long, env = "SWARMOS_WORKER_PRIVATE_KEY")]
    private_key: Option<String>,
}

fn load_or_generate_signing_key(hex_key: Option<String>) -> SigningKey {
    match hex_key {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key.trim_start_matches("0x")).expect("private key must be valid hex");
            SigningKey::from_slice(&bytes).expect("private key must be a valid secp256k1 scalar")
        }
        None => {
            tracing::warn!("no SWARMOS_WORKER_PRIVATE_KEY set, generating an ephemeral signing key");
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

    let signing_key = load_or_generate_signing_key(args.private_key);
    let identity = address_from_signing_key(&signing_key);
    info!(identity, controller_url = %args.controller_url, "worker identity");

    let client = Arc::new(HttpControllerClient::new(args.controller_url));
    let inference: Arc<dyn Inference> = match args.inference_url {
        Some(url) => Arc::new(HttpInference::new(url)),
        None => {
            tracing::warn!("no SWARMOS_INFERENCE_URL set, this worker cannot execute any claimed jobs");
            Arc::new(HttpInference::new(String::new()))
        }
    };

    let agent = Arc::new(WorkerAgent::new(
        identity,
        args.gpu_model,
        args.vram_gb,
        args.endpoint,
        config,
        client,
        inference,
        signing_key,
    ));

    let shutdown = CancellationToken::new();
    let shutdown_trigger = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("worker received shutdown signal, draining");
        shutdown_trigger.cancel();
    });

    agent.run(shutdown).await;
    info!("worker stopped");
    Ok(())
}
