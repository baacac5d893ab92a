//! Bounded exponential backoff for dependencies that may still be starting.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::future::retry_notify;
use backoff::{Error as BackoffError, ExponentialBackoff};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Total time budget. The last sleep is trimmed so the final attempt
    /// happens at the deadline, never after it.
    pub max_wait: Duration,
}

impl RetryPolicy {
    pub fn new(initial_interval: Duration, max_interval: Duration, max_wait: Duration) -> Self {
        Self {
            initial_interval,
            max_interval: max_interval.max(initial_interval),
            multiplier: 2.0,
            max_wait,
        }
    }

    /// The database usually needs a few seconds after its container starts.
    pub fn database_default() -> Self {
        Self::new(
            Duration::from_millis(250),
            Duration::from_secs(5),
            Duration::from_secs(60),
        )
    }

    pub fn service_default(max_wait: Duration) -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(2), max_wait)
    }

    fn backoff(&self) -> BudgetedBackoff {
        BudgetedBackoff {
            intervals: ExponentialBackoff {
                current_interval: self.initial_interval,
                initial_interval: self.initial_interval,
                randomization_factor: 0.0,
                multiplier: self.multiplier,
                max_interval: self.max_interval,
                // The budget is enforced below, on tokio's clock.
                max_elapsed_time: None,
                ..ExponentialBackoff::default()
            },
            started: Instant::now(),
            max_wait: self.max_wait,
        }
    }
}

/// Exponential intervals cut off at `max_wait`, measured with
/// `tokio::time::Instant` so a paused test clock is honored.
struct BudgetedBackoff {
    intervals: ExponentialBackoff,
    started: Instant,
    max_wait: Duration,
}

impl Backoff for BudgetedBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        let waited = self.started.elapsed();
        if waited >= self.max_wait {
            return None;
        }
        self.intervals
            .next_backoff()
            .map(|pause| pause.min(self.max_wait - waited))
    }

    fn reset(&mut self) {
        self.intervals.reset();
        self.started = Instant::now();
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Transient failures kept happening until the budget ran out.
    Exhausted {
        attempts: u32,
        waited: Duration,
        last: E,
    },
    /// A failure that retrying cannot fix.
    Permanent(E),
}

/// Run `op` until it succeeds, fails permanently, or `policy.max_wait`
/// has elapsed. Only errors for which `is_transient` holds are retried.
pub async fn retry_transient<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
    is_transient: P,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let started = Instant::now();
    let attempts = AtomicU32::new(0);
    let classify = &is_transient;

    let attempt = || {
        attempts.fetch_add(1, Ordering::Relaxed);
        let fut = op();
        async move {
            fut.await.map_err(|e| {
                if classify(&e) {
                    BackoffError::transient(e)
                } else {
                    BackoffError::permanent(e)
                }
            })
        }
    };
    let log_failure = |error: E, pause: Duration| {
        tracing::warn!(
            "{} unavailable (attempt {}), retrying in {:?}: {}",
            what,
            attempts.load(Ordering::Relaxed),
            pause,
            error
        );
    };

    let result = retry_notify(policy.backoff(), attempt, log_failure).await;
    let attempts = attempts.load(Ordering::Relaxed);
    let waited = started.elapsed();

    match result {
        Ok(value) => {
            if attempts > 1 {
                tracing::info!(
                    "{} available after {} attempt(s) in {:?}",
                    what,
                    attempts,
                    waited
                );
            }
            Ok(value)
        }
        Err(e) if !is_transient(&e) => Err(RetryError::Permanent(e)),
        Err(e) => {
            tracing::error!(
                "{} still unavailable after {} attempt(s) over {:?}: {}",
                what,
                attempts,
                waited,
                e
            );
            Err(RetryError::Exhausted {
                attempts,
                waited,
                last: e,
            })
        }
    }
}
