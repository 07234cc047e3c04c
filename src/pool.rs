//! Bounded fan-out with per-task retry, shared by every fetcher.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::debug;

/// Errors that may succeed on a later attempt.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempt ceiling is hit.
    /// On failure returns the last error together with the number of attempts made.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, (E, u32)>
    where
        E: Transient + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    debug!(
                        task = label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err((e, attempt + 1)),
            }
        }
    }

    /// Equal jitter backoff: base/2 + rand(0, base/2), base doubling per attempt.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64 * 2u64.pow(attempt);
        let half = base / 2;
        Duration::from_millis(half + fastrand::u64(..half.max(1)))
    }
}

/// Fixed pause between requests to the same external service.
#[derive(Debug, Clone, Copy)]
pub struct Throttle(pub Duration);

impl Throttle {
    pub async fn pause(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TaskPool {
    workers: usize,
    pub retry: RetryPolicy,
}

impl TaskPool {
    pub fn new(workers: usize, retry: RetryPolicy) -> Self {
        Self {
            workers: workers.max(1),
            retry,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `task` over `items` with at most `workers` in flight.
    /// Results come back in completion order, not input order.
    pub async fn run<I, T, R, F, Fut>(&self, items: I, task: F) -> Vec<R>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(T) -> Fut,
        Fut: Future<Output = R>,
    {
        stream::iter(items)
            .map(task)
            .buffer_unordered(self.workers)
            .collect()
            .await
    }
}
