//! Fixed-delay retry wrapper

use std::time::Duration;

use tracing::warn;

use crate::constants::{DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY};

/// How many extra attempts to make and how long to pause between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub retries: u8,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRY_COUNT,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u8, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Upper bound on calls to the operation
    pub fn max_attempts(&self) -> u32 {
        u32::from(self.retries) + 1
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out
    ///
    /// `op` receives the zero-based attempt number. Only errors for which
    /// `is_retryable` returns true trigger another attempt; the last error is
    /// returned unchanged.
    pub fn run<T, E, F, P>(&self, op_name: &str, is_retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < u32::from(self.retries) && is_retryable(&e) => {
                    attempt += 1;
                    warn!(
                        "{} failed: {}, retrying ({}/{})",
                        op_name, e, attempt, self.retries
                    );
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}
