// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Typed, environment-driven configuration shared by all three services.
//! Every tunable named in the external interface and concurrency sections
//! lives here with the documented default, following the env-var parsing
//! idiom already used to bring up the inference engine at process start.

use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct FeeSplit {
    /// Percent of gross epoch revenue kept by the protocol.
    pub protocol_pct: f64,
    /// Percent of gross epoch revenue kept by the operator.
    pub operator_pct: f64,
    /// Of the remainder after protocol+operator, the share paid to the work pool.
    pub work_pool_pct: f64,
    /// Of the remainder after protocol+operator, the share paid to the readiness pool.
    pub readiness_pool_pct: f64,
    /// Minimum uptime fraction (0.0-1.0) to qualify for a readiness-pool share.
    pub min_uptime_threshold: f64,
}

impl Default for FeeSplit {
    fn default() -> Self {
        Self {
            protocol_pct: 0.02,
            operator_pct: 0.05,
            work_pool_pct: 0.70,
            readiness_pool_pct: 0.30,
            min_uptime_threshold: 0.90,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub price_per_job_cents: i64,
    pub replay_window_secs: i64,
    pub claim_timeout_floor_secs: i64,
    pub claim_timeout_multiplier: u32,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_timeout_secs: i64,
    pub heartbeat_sweep_interval_secs: u64,
    pub poll_interval_secs: u64,
    pub fee_split: FeeSplit,
    pub controller_listen_addr: String,
    pub ledger_listen_addr: String,
    pub retry_attempts: usize,
    pub retry_base_delay: Duration,
    /// Default per-kind external inference timeout; an operator can
    /// override specific kinds out of band (e.g. via a model catalog
    /// lookup), but the core only needs a floor to bound the claim loop.
    pub default_inference_timeout_secs: u64,
    /// Heartbeat failures in a row before the agent transitions to `draining`.
    pub heartbeat_failure_limit: u32,
    /// How often the sealer task rotates and seals the current epoch. An
    /// operator can also trigger a seal out of band via `/epochs/:id/seal`.
    pub epoch_seal_interval_secs: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            price_per_job_cents: 10, // $0.10
            replay_window_secs: 300,
            claim_timeout_floor_secs: 60,
            claim_timeout_multiplier: 5,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            heartbeat_sweep_interval_secs: 10,
            poll_interval_secs: 2,
            fee_split: FeeSplit::default(),
            controller_listen_addr: "127.0.0.1:8080".to_string(),
            ledger_listen_addr: "127.0.0.1:8081".to_string(),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
            default_inference_timeout_secs: 300,
            heartbeat_failure_limit: 3,
            epoch_seal_interval_secs: 3600,
        }
    }
}

impl SwarmConfig {
    /// Build configuration from environment variables, falling back to the
    /// documented defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            price_per_job_cents: env_or("SWARMOS_PRICE_PER_JOB_CENTS", defaults.price_per_job_cents),
            replay_window_secs: env_or("SWARMOS_REPLAY_WINDOW_SECS", defaults.replay_window_secs),
            claim_timeout_floor_secs: env_or(
                "SWARMOS_CLAIM_TIMEOUT_FLOOR_SECS",
                defaults.claim_timeout_floor_secs,
            ),
            claim_timeout_multiplier: env_or(
                "SWARMOS_CLAIM_TIMEOUT_MULTIPLIER",
                defaults.claim_timeout_multiplier,
            ),
            heartbeat_interval_secs: env_or(
                "SWARMOS_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval_secs,
            ),
            heartbeat_timeout_secs: env_or(
                "SWARMOS_HEARTBEAT_TIMEOUT_SECS",
                defaults.heartbeat_timeout_secs,
            ),
            heartbeat_sweep_interval_secs: env_or(
                "SWARMOS_HEARTBEAT_SWEEP_INTERVAL_SECS",
                defaults.heartbeat_sweep_interval_secs,
            ),
            poll_interval_secs: env_or("SWARMOS_POLL_INTERVAL_SECS", defaults.poll_interval_secs),
            fee_split: FeeSplit {
                protocol_pct: env_or("SWARMOS_FEE_PROTOCOL_PCT", defaults.fee_split.protocol_pct),
                operator_pct: env_or("SWARMOS_FEE_OPERATOR_PCT", defaults.fee_split.operator_pct),
                work_pool_pct: env_or("SWARMOS_FEE_WORK_POOL_PCT", defaults.fee_split.work_pool_pct),
                readiness_pool_pct: env_or(
                    "SWARMOS_FEE_READINESS_POOL_PCT",
                    defaults.fee_split.readiness_pool_pct,
                ),
                min_uptime_threshold: env_or(
                    "SWARMOS_MIN_UPTIME_THRESHOLD",
                    defaults.fee_split.min_uptime_threshold,
                ),
            },
            controller_listen_addr: env::var("SWARMOS_CONTROLLER_ADDR")
                .unwrap_or(defaults.controller_listen_addr),
            ledger_listen_addr: env::var("SWARMOS_LEDGER_ADDR").unwrap_or(defaults.ledger_listen_addr),
            retry_attempts: env_or("SWARMOS_RETRY_ATTEMPTS", defaults.retry_attempts),
            retry_base_delay: Duration::from_millis(env_or(
                "SWARMOS_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )),
            default_inference_timeout_secs: env_or(
                "SWARMOS_INFERENCE_TIMEOUT_SECS",
                defaults.default_inference_timeout_secs,
            ),
            heartbeat_failure_limit: env_or(
                "SWARMOS_HEARTBEAT_FAILURE_LIMIT",
                defaults.heartbeat_failure_limit,
            ),
            epoch_seal_interval_secs: env_or(
                "SWARMOS_EPOCH_SEAL_INTERVAL_SECS",
                defaults.epoch_seal_interval_secs,
            ),
        }
    }

    pub fn claim_timeout(&self, expected_inference_secs: i64) -> i64 {
        self.claim_timeout_floor_secs
            .max(expected_inference_secs * self.claim_timeout_multiplier as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = SwarmConfig::default();
        assert_eq!(cfg.price_per_job_cents, 10);
        assert_eq!(cfg.replay_window_secs, 300);
        assert_eq!(cfg.claim_timeout(1), 60);
        assert_eq!(cfg.claim_timeout(20), 100);
    }

    #[test]
    fn fee_split_sums_to_one_after_protocol_and_operator() {
        let split = FeeSplit::default();
        assert!((split.work_pool_pct + split.readiness_pool_pct - 1.0).abs() < 1e-9);
    }
}
