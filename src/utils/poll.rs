//! Fixed-interval polling
//!
//! Used by the readiness checks that wait on cloud and cluster state.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Polling errors
#[derive(Error, Debug)]
pub enum PollError {
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },
}

/// Polling schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between attempts
    pub interval: Duration,

    /// Total time budget
    pub timeout: Duration,

    /// Check once before the first sleep
    pub immediate: bool,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            immediate: true,
        }
    }

    pub fn from_secs(interval_secs: u64, timeout_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn delayed(mut self) -> Self {
        self.immediate = false;
        self
    }
}

/// Run `condition` until it yields a value, returns an error, or the
/// timeout expires.
///
/// `Ok(None)` means "not yet". An `Err` aborts polling immediately, so
/// conditions that want to retry on transient failures should log and
/// return `Ok(None)` instead.
pub async fn poll_until<T, F, Fut>(what: &str, config: PollConfig, mut condition: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + config.timeout;

    if !config.immediate {
        sleep(config.interval).await;
    }

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if let Some(value) = condition().await? {
            debug!("{} ready after {} attempt(s)", what, attempt);
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PollError::Timeout {
                what: what.to_string(),
                timeout: config.timeout,
            }
            .into());
        }

        sleep(config.interval.min(deadline - now)).await;
    }
}
