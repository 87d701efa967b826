//! Bounded retry with a fixed delay
//!
//! The apply call is the only retried operation in the handshake. The
//! policy is injected so production uses the observed 32 × 300 ms loop
//! while tests run with zero delay.

use std::time::Duration;

/// A bounded retry policy: up to `max_attempts` tries with a fixed
/// `delay` between them (no backoff growth).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (at least 1)
    pub max_attempts: u32,
    /// Fixed sleep between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 32,
            delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    /// Build a policy with the given attempt budget and delay
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Zero-delay policy for tests
    pub const fn no_delay(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted.
    ///
    /// `op` receives the 1-based attempt number. The last error is
    /// returned unchanged; no sleep happens after the final attempt.
    pub fn run<T, E, F>(&self, mut op: F) -> core::result::Result<T, E>
    where
        F: FnMut(u32) -> core::result::Result<T, E>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    log::debug!("attempt {}/{} failed: {}", attempt, attempts, e);
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
