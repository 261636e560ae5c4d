// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded retry with a fixed backoff for printer connections.
//
// Label printers drop connections while busy, rebooting or out of media.
// Every connect or write failure is worth another try, so there is no error
// classification here: the budget alone decides when to give up.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use etikett_core::config::DispatchConfig;

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(510),
        }
    }
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            retries: config.retries,
            backoff: config.backoff(),
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Budget exhausted.
    Exhausted,
}

/// Decide what happens after failed attempt number `attempt` (1-based).
pub fn should_retry(attempt: u32, policy: &RetryPolicy) -> RetryDecision {
    if attempt >= policy.max_attempts() {
        RetryDecision::Exhausted
    } else {
        RetryDecision::RetryAfter(policy.backoff)
    }
}

/// A failed run: the last error and how many attempts were made.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy gives up.
///
/// `op` receives the 1-based attempt number.  On success returns the value
/// and the number of attempts it took.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    device: &str,
    mut op: F,
) -> std::result::Result<(T, u32), Exhausted<E>>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) => match should_retry(attempt, policy) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(device, attempt, error = %e, "device attempt failed, retrying");
                    debug!(delay_ms = delay.as_millis() as u64, "backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Exhausted => {
                    warn!(device, attempts = attempt, error = %e, "retry budget exhausted");
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
            },
        }
    }
}
