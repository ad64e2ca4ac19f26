//! Bounded retry with a fixed backoff.

use std::thread;
use std::time::Duration;

use log::warn;

/// How often an operation may run and how long to wait between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts, backoff }
    }
}

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub enum Retry<E> {
    /// Worth another attempt while the budget lasts.
    Transient(E),
    /// Give up immediately.
    Permanent(E),
}

/// Why `retry` gave up.
#[derive(Debug)]
pub enum RetryFailure<E> {
    Exhausted { attempts: u32, last: E },
    Permanent(E),
}

/// Run `operation` until it succeeds, fails permanently, or the budget runs
/// out. The operation receives the 1-based attempt number.
pub fn retry<T, E, F>(policy: &RetryPolicy, mut operation: F) -> Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Result<T, Retry<E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(Retry::Permanent(error)) => return Err(RetryFailure::Permanent(error)),
            Err(Retry::Transient(error)) if attempt >= max_attempts => {
                return Err(RetryFailure::Exhausted { attempts: attempt, last: error });
            }
            Err(Retry::Transient(error)) => {
                warn!(attempt = attempt, max_attempts = max_attempts; "Attempt failed, retrying: {error}");
                if !policy.backoff.is_zero() {
                    thread::sleep(policy.backoff);
                }
                attempt += 1;
            }
        }
    }
}
