//! Bounded retry with exponential backoff and jitter for transient I/O errors
//!
//! Log files are appended to while we read them; a read can hit a transient
//! OS error that succeeds a few milliseconds later.

use rand::RngExt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Retry policy for transient per-file errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each subsequent retry
    pub base_delay: Duration,
    /// Cap on the backoff before jitter is added
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based), with up to 50% jitter
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << shift).min(self.max_delay);

        let jitter_range = backoff.as_millis() as u64 / 2;
        let jitter = if jitter_range > 0 {
            rand::rng().random_range(0..=jitter_range)
        } else {
            0
        };

        backoff + Duration::from_millis(jitter)
    }
}

/// Errors worth retrying: the same call is likely to succeed shortly
pub fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are exhausted.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient I/O error, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
