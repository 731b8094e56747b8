//! Bounded retries with a fixed delay for network-bound git calls

use crate::core::error::ScanResult;
use std::thread;
use std::time::Duration;

/// Retry policy for one kind of remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first one (at least 1)
  pub attempts: u32,
  /// Sleep between attempts
  pub delay: Duration,
}

impl RetryPolicy {
  pub fn new(attempts: u32, delay: Duration) -> Self {
    Self {
      attempts: attempts.max(1),
      delay,
    }
  }

  /// Single attempt, no delay
  pub fn once() -> Self {
    Self::new(1, Duration::ZERO)
  }

  /// Run `op` until it succeeds or the attempts are exhausted.
  ///
  /// Returns the last error when every attempt failed.
  pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> ScanResult<T>) -> ScanResult<T> {
    let mut attempt = 1;
    loop {
      match op() {
        Ok(value) => return Ok(value),
        Err(err) if attempt < self.attempts => {
          tracing::warn!(operation = what, attempt, max_attempts = self.attempts, error = %err, "retrying");
          if !self.delay.is_zero() {
            thread::sleep(self.delay);
          }
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
  }
}
