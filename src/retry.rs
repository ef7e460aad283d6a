// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Retry-with-backoff helper for transient Controller-to-Ledger calls.
//! Generalizes the fixed-delay retry loop used for job and payment claiming
//! into exponential backoff with jitter, and separates permanent failures
//! (returned immediately) from transient ones (retried).

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Implemented by error types passed through `retry_with_backoff` so the
/// helper can tell a permanent failure (no point retrying) from a transient
/// one, mirroring the `ClaimError` match arms that short-circuit retry for
/// `NodeNotRegistered` / `JobNotFound` / `JobAlreadyClaimed`.
pub trait Retryable {
    fn is_permanent(&self) -> bool;
}

/// Runs `op` up to `attempts` times with exponential backoff starting at
/// `base_delay`, doubling each attempt, with up to 50% jitter added. Stops
/// immediately if `op` returns an error for which `is_permanent()` is true.
pub async fn retry_with_backoff<T, E, F, Fut>(
    attempts: usize,
    base_delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 0..attempts.max(1) {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if e.is_permanent() {
                    return Err(e);
                }
                last_error = Some(e);
                if attempt + 1 < attempts {
                    let delay = backoff_delay(base_delay, attempt as u32);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transient error");
                    sleep(delay).await;
                }
            }
        }
    }

    Err(last_error.expect("attempts.max(1) guarantees at least one iteration"))
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.min(16));
    let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..0.5);
    exp.mul_f64(1.0 + jitter_frac)
}
